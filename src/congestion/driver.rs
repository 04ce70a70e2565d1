//! 引擎侧的拥塞控制驱动器
//! Engine-side driver for a connection's congestion control.
//!
//! 职责：
//! - 持有连接绑定的算法实例及其能力句柄
//! - 将生命周期和流量事件分发给算法
//! - 吸收回调中的故障，防止其传播到引擎
//!
//! Responsibilities:
//! - own the algorithm bound to a connection and its capability handle
//! - deliver lifecycle and traffic events to the algorithm
//! - absorb faults raised inside callbacks so they never reach the engine

use super::{
    factory::AlgorithmRegistry,
    handle::{AckMode, ControlHandle, EngineLink, PacingState},
    CongestionControl,
};
use crate::{config::CongestionControlConfig, error::Result, packet::Packet};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, error, trace};

/// Drives one connection's congestion control algorithm.
///
/// The engine is the only writer of measurements and the only reader of the
/// pacing decisions; events are delivered serially on the connection's event
/// path, so no locking is involved.
///
/// 驱动一个连接的拥塞控制算法。
#[derive(Debug)]
pub struct CongestionDriver {
    algorithm: Box<dyn CongestionControl>,
    handle: ControlHandle,
    connected: bool,
    closed: bool,
}

impl CongestionDriver {
    /// Binds `algorithm` to a new connection.
    ///
    /// 将 `algorithm` 绑定到一个新连接。
    pub fn new(
        algorithm: Box<dyn CongestionControl>,
        config: &CongestionControlConfig,
        link: Arc<dyn EngineLink>,
    ) -> Self {
        Self {
            algorithm,
            handle: ControlHandle::new(config, link),
            connected: false,
            closed: false,
        }
    }

    /// Creates the algorithm selected by `config.algorithm` from `registry`.
    ///
    /// 从 `registry` 创建由 `config.algorithm` 选择的算法。
    pub fn from_registry(
        registry: &AlgorithmRegistry,
        config: &CongestionControlConfig,
        link: Arc<dyn EngineLink>,
    ) -> Result<Self> {
        let algorithm = registry.create(&config.algorithm)?;
        Ok(Self::new(algorithm, config, link))
    }

    /// The tag of the bound algorithm.
    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// The pacing state the engine schedules transmissions from.
    ///
    /// 引擎据以调度发送的节奏状态。
    pub fn pacing(&self) -> &PacingState {
        self.handle.pacing()
    }

    /// The inter-packet sending period, saturating at `Duration::MAX`.
    pub fn send_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.handle.pacing().pkt_snd_period() / 1_000_000.0)
            .unwrap_or(Duration::MAX)
    }

    /// The congestion window, rounded down to whole packets.
    pub fn window_packets(&self) -> u32 {
        self.handle.pacing().cwnd() as u32
    }

    /// How the algorithm wants acknowledgments to be scheduled.
    pub fn ack_mode(&self) -> AckMode {
        self.handle.ack_mode()
    }

    /// The user-defined RTO, if the algorithm set one.
    pub fn rto_override(&self) -> Option<Duration> {
        self.handle.rto_override()
    }

    pub fn set_mss(&mut self, mss: u32) {
        self.handle.set_mss(mss);
    }

    pub fn set_max_cwnd(&mut self, max_cwnd: f64) {
        self.handle.set_max_cwnd(max_cwnd);
    }

    pub fn set_bandwidth(&mut self, packets_per_sec: u32) {
        self.handle.set_bandwidth(packets_per_sec);
    }

    pub fn set_snd_curr_seq(&mut self, seq: u32) {
        self.handle.set_snd_curr_seq(seq);
    }

    pub fn set_rcv_rate(&mut self, packets_per_sec: u32) {
        self.handle.set_rcv_rate(packets_per_sec);
    }

    pub fn set_rtt(&mut self, rtt_us: u32) {
        self.handle.set_rtt(rtt_us);
    }

    /// Delivers the connection-established event. Later calls are ignored.
    ///
    /// 分发连接建立事件。重复调用会被忽略。
    pub fn on_connect(&mut self) {
        if self.connected {
            return;
        }
        self.connected = true;
        debug!(algorithm = self.algorithm.name(), "Congestion control bound to connection");
        self.dispatch("init", |cc, h| cc.init(h));
    }

    pub fn on_ack(&mut self, ack: u32) {
        self.dispatch("on_ack", |cc, h| cc.on_ack(h, ack));
    }

    pub fn on_loss(&mut self, loss_list: &[u32]) {
        self.dispatch("on_loss", |cc, h| cc.on_loss(h, loss_list));
    }

    pub fn on_timeout(&mut self) {
        self.dispatch("on_timeout", |cc, h| cc.on_timeout(h));
    }

    pub fn on_pkt_sent(&mut self, packet: &Packet) {
        self.dispatch("on_pkt_sent", |cc, h| cc.on_pkt_sent(h, packet));
    }

    pub fn on_pkt_received(&mut self, packet: &Packet) {
        self.dispatch("on_pkt_received", |cc, h| cc.on_pkt_received(h, packet));
    }

    pub fn on_custom_msg(&mut self, packet: &Packet) {
        self.dispatch("process_custom_msg", |cc, h| cc.process_custom_msg(h, packet));
    }

    /// Delivers the connection-closed event. Runs at most once; dropping a
    /// connected driver closes it as well.
    ///
    /// 分发连接关闭事件。最多执行一次；丢弃已连接的驱动器也会关闭它。
    pub fn on_close(&mut self) {
        if !self.connected || self.closed {
            return;
        }
        self.dispatch("close", |cc, h| cc.close(h));
        self.closed = true;
    }

    fn dispatch<F>(&mut self, event: &'static str, f: F)
    where
        F: FnOnce(&mut dyn CongestionControl, &mut ControlHandle),
    {
        if !self.connected || self.closed {
            trace!(event, "Congestion event outside connection lifetime dropped");
            return;
        }
        let algorithm = &mut *self.algorithm;
        let handle = &mut self.handle;
        let name = algorithm.name();
        if catch_unwind(AssertUnwindSafe(|| f(algorithm, handle))).is_err() {
            error!(algorithm = name, event, "Congestion control callback panicked, event dropped");
        }
    }
}

impl Drop for CongestionDriver {
    fn drop(&mut self) {
        self.on_close();
    }
}
