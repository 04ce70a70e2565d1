//! Defines the pluggable congestion control interface.
//! 定义了可插拔的拥塞控制接口。
//!
//! An algorithm is bound to exactly one connection for its whole lifetime.
//! The engine delivers lifecycle and traffic events through a
//! [`CongestionDriver`], and the algorithm influences its connection only via
//! the [`ControlHandle`] it is given on every call.

pub mod driver;
pub mod factory;
pub mod handle;
pub mod rate;
pub mod vegas;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

pub use driver::CongestionDriver;
pub use factory::{AlgorithmFactory, AlgorithmRegistry, CongestionFactory, FromConfig};
pub use handle::{AckMode, ControlHandle, EngineLink, PacingState, PerfSnapshot};
pub use rate::RateControl;
pub use vegas::Vegas;

use crate::packet::Packet;

/// A trait for congestion control algorithms.
///
/// Every callback defaults to a no-op so an implementation only overrides
/// what it needs. Callbacks return nothing: the engine has no recovery path
/// for a failing callback, so faults must be handled (or logged) inside.
///
/// Algorithms are not `Clone`: their state belongs to one connection and is
/// never copied onto another.
///
/// 拥塞控制算法的 trait。
///
/// 所有回调默认为空操作，实现者只需覆盖需要的部分。回调没有返回值：
/// 引擎无法从失败的回调中恢复，因此错误必须在内部处理（或记录）。
pub trait CongestionControl: Send + Sync + 'static {
    /// A short tag identifying the algorithm.
    ///
    /// 标识算法的简短标签。
    fn name(&self) -> &'static str;

    /// Called once when the connection is established.
    ///
    /// 连接建立时调用一次。
    fn init(&mut self, _cc: &mut ControlHandle) {}

    /// Called when the connection is closed.
    ///
    /// 连接关闭时调用。
    fn close(&mut self, _cc: &mut ControlHandle) {}

    /// Called when an ACK arrives. `ack` is the next sequence number the peer
    /// expects, so everything before it has been received.
    ///
    /// 收到ACK时调用。`ack` 是对端期望的下一个序列号。
    fn on_ack(&mut self, _cc: &mut ControlHandle, _ack: u32) {}

    /// Called when a loss report arrives. See [`crate::packet::loss`] for the
    /// list format.
    ///
    /// 收到丢失报告时调用。
    fn on_loss(&mut self, _cc: &mut ControlHandle, _loss_list: &[u32]) {}

    /// Called when the retransmission timer expires.
    ///
    /// 重传定时器超时时调用。
    fn on_timeout(&mut self, _cc: &mut ControlHandle) {}

    /// Called after a data packet was sent.
    ///
    /// 发送数据包后调用。
    fn on_pkt_sent(&mut self, _cc: &mut ControlHandle, _packet: &Packet) {}

    /// Called after a data packet was received.
    ///
    /// 接收数据包后调用。
    fn on_pkt_received(&mut self, _cc: &mut ControlHandle, _packet: &Packet) {}

    /// Called when the peer's algorithm sent a user-defined control packet.
    ///
    /// 当对端算法发送了用户自定义控制包时调用。
    fn process_custom_msg(&mut self, _cc: &mut ControlHandle, _packet: &Packet) {}
}

impl std::fmt::Debug for dyn CongestionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CongestionControl({})", self.name())
    }
}
