//! Wrapping arithmetic on 31-bit packet sequence numbers.
//! 31位包序列号的回绕运算。
//!
//! Sequence numbers live in `0..=MAX_SEQ_NO` and wrap to zero. Two numbers are
//! compared by the shorter way around the ring, so any pair less than
//! `SEQ_NO_THRESHOLD` apart orders correctly across the wrap point.

/// The largest sequence number before wrapping to zero.
pub const MAX_SEQ_NO: u32 = 0x7FFF_FFFF;

/// Half of the sequence space; distances below it are compared directly.
pub const SEQ_NO_THRESHOLD: u32 = 0x3FFF_FFFF;

/// Compares two sequence numbers.
///
/// Returns a positive value if `a` is after `b`, negative if before, zero if
/// equal. The magnitude is only meaningful for nearby numbers.
///
/// 比较两个序列号。`a` 在 `b` 之后返回正值，之前返回负值，相等返回零。
pub fn seq_cmp(a: u32, b: u32) -> i64 {
    let (a, b) = (a as i64, b as i64);
    if (a - b).abs() < SEQ_NO_THRESHOLD as i64 {
        a - b
    } else {
        b - a
    }
}

/// The number of sequence numbers in the inclusive range `[a, b]`.
///
/// 闭区间 `[a, b]` 内的序列号数量。
pub fn seq_len(a: u32, b: u32) -> u32 {
    if a <= b {
        b - a + 1
    } else {
        b.wrapping_sub(a).wrapping_add(MAX_SEQ_NO).wrapping_add(2)
    }
}

/// The signed distance from `a` forward to `b`.
///
/// 从 `a` 向前到 `b` 的有符号距离。
pub fn seq_off(a: u32, b: u32) -> i64 {
    let (ai, bi) = (a as i64, b as i64);
    if (ai - bi).abs() < SEQ_NO_THRESHOLD as i64 {
        return bi - ai;
    }
    if ai < bi {
        bi - ai - MAX_SEQ_NO as i64 - 1
    } else {
        bi - ai + MAX_SEQ_NO as i64 + 1
    }
}

/// The sequence number following `seq`.
pub fn seq_inc(seq: u32) -> u32 {
    if seq >= MAX_SEQ_NO { 0 } else { seq + 1 }
}

/// The sequence number preceding `seq`.
pub fn seq_dec(seq: u32) -> u32 {
    if seq == 0 { MAX_SEQ_NO } else { seq - 1 }
}
