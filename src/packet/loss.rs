//! 定义了丢失报告（NAK）中使用的丢失列表格式。
//! Defines the loss-list format carried by loss reports (NAKs).
//!
//! A loss list is a flat sequence of `u32` sequence numbers. An entry with
//! `LOSS_RANGE_FLAG` set starts a contiguous range whose inclusive end is the
//! next entry; an entry without the flag is a single lost packet.

use super::seq::{seq_cmp, seq_len};

/// The high-order bit marking the first entry of a range.
/// 标记范围起始条目的最高位。
pub const LOSS_RANGE_FLAG: u32 = 0x8000_0000;

/// A contiguous range of lost sequence numbers.
/// 一个连续的丢失序列号范围。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossRange {
    /// The first lost sequence number (inclusive).
    /// 第一个丢失的序列号（包含）。
    pub start: u32,
    /// The last lost sequence number (inclusive).
    /// 最后一个丢失的序列号（包含）。
    pub end: u32,
}

impl LossRange {
    /// The number of packets covered by this range.
    pub fn len(&self) -> u32 {
        seq_len(self.start, self.end)
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Returns the first lost sequence number of a loss list, with the range flag stripped.
///
/// 返回丢失列表中第一个丢失的序列号（已去除范围标志）。
pub fn first_lost(list: &[u32]) -> Option<u32> {
    list.first().map(|seq| seq & !LOSS_RANGE_FLAG)
}

/// Iterates over the ranges of a loss list.
///
/// A trailing range start without an end is treated as a single packet.
///
/// 遍历丢失列表中的范围。末尾缺少结束条目的范围起始被视为单个包。
pub fn ranges(list: &[u32]) -> LossRanges<'_> {
    LossRanges { list, pos: 0 }
}

/// Iterator returned by [`ranges`].
#[derive(Debug, Clone)]
pub struct LossRanges<'a> {
    list: &'a [u32],
    pos: usize,
}

impl Iterator for LossRanges<'_> {
    type Item = LossRange;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = *self.list.get(self.pos)?;
        self.pos += 1;
        if entry & LOSS_RANGE_FLAG == 0 {
            return Some(LossRange {
                start: entry,
                end: entry,
            });
        }
        let start = entry & !LOSS_RANGE_FLAG;
        match self.list.get(self.pos) {
            Some(&end) if seq_cmp(end, start) >= 0 => {
                self.pos += 1;
                Some(LossRange { start, end })
            }
            _ => Some(LossRange { start, end: start }),
        }
    }
}

/// Total number of packets reported lost by a loss list.
///
/// 丢失列表报告的丢包总数。
pub fn lost_packets(list: &[u32]) -> u64 {
    ranges(list).map(|r| r.len() as u64).sum()
}

/// Encodes a list of loss ranges into the flat loss-list format.
///
/// 将丢失范围列表编码为扁平的丢失列表格式。
pub fn encode_loss_ranges(ranges: &[LossRange]) -> Vec<u32> {
    let mut list = Vec::with_capacity(ranges.len() * 2);
    for range in ranges {
        if range.start == range.end {
            list.push(range.start);
        } else {
            list.push(range.start | LOSS_RANGE_FLAG);
            list.push(range.end);
        }
    }
    list
}
