//! The packet module: the packet value handed to congestion callbacks, the
//! wrapping sequence-number arithmetic and the loss-list format.
//! packet 模块：交给拥塞回调的包值、回绕序列号运算以及丢失列表格式。

use bytes::Bytes;

pub mod loss;
pub mod seq;

/// What a packet carries, as far as the congestion core cares.
///
/// 就拥塞核心而言，包承载的内容类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// A data packet carrying user payload.
    /// 承载用户载荷的数据包。
    Data,
    /// A user-defined control packet, tagged with its message type.
    /// 用户自定义的控制包，带有其消息类型。
    Custom(u16),
}

/// A packet as seen by the congestion control callbacks.
///
/// Serialization is owned by the engine's packet layer; this is only the
/// decoded view.
///
/// 拥塞控制回调所看到的包。序列化由引擎的包层负责，这里只是解码后的视图。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The kind of the packet.
    /// 包的类型。
    pub kind: PacketKind,
    /// The sequence number of a data packet; zero for control packets.
    /// 数据包的序列号；控制包为零。
    pub sequence_number: u32,
    /// The timestamp when this packet is sent, in microseconds.
    /// 此包的发送时间戳（微秒）。
    pub timestamp: u32,
    /// The payload.
    /// 载荷。
    pub payload: Bytes,
}

impl Packet {
    /// Creates a data packet.
    /// 创建一个数据包。
    pub fn data(sequence_number: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: PacketKind::Data,
            sequence_number,
            timestamp: 0,
            payload: payload.into(),
        }
    }

    /// Creates a user-defined control packet.
    /// 创建一个用户自定义的控制包。
    pub fn custom(message_type: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: PacketKind::Custom(message_type),
            sequence_number: 0,
            timestamp: 0,
            payload: payload.into(),
        }
    }

    /// Returns the payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
