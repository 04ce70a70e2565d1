//! 拥塞算法的能力句柄
//! The capability handle given to congestion control algorithms.
//!
//! An algorithm never sees its connection. It gets a [`ControlHandle`] that
//! carries the connection's pacing state and a small set of mutators; the
//! handle in turn reaches the engine only through an injected [`EngineLink`].

use crate::{config::CongestionControlConfig, error::Result, packet::Packet};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, trace, warn};

/// The engine operations a handle may invoke on behalf of its algorithm.
///
/// Implemented by the connection; a handle holds it as `Arc<dyn EngineLink>`.
///
/// 句柄可以代表其算法调用的引擎操作。由连接实现。
pub trait EngineLink: Send + Sync {
    /// Sends a user-defined control packet to the peer of the owning connection.
    ///
    /// 向所属连接的对端发送用户自定义控制包。
    fn send_custom_msg(&self, packet: Packet) -> Result<()>;

    /// Samples the connection's current performance counters.
    ///
    /// 采样连接当前的性能计数器。
    fn sample_perf(&self) -> Result<PerfSnapshot>;
}

/// A read-only snapshot of a connection's performance.
///
/// 连接性能的只读快照。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfSnapshot {
    /// Time since the connection was established.
    /// 自连接建立以来的时间。
    pub elapsed: Duration,
    /// Data packets sent / received.
    /// 已发送/已接收的数据包数。
    pub pkt_sent: u64,
    pub pkt_recv: u64,
    /// Packets reported lost by the peer / detected lost locally.
    /// 对端报告丢失的包数 / 本地检测到丢失的包数。
    pub pkt_snd_loss: u64,
    pub pkt_rcv_loss: u64,
    /// Retransmitted packets.
    /// 重传的包数。
    pub pkt_retrans: u64,
    /// Sending / receiving throughput in Mbit/s.
    /// 发送/接收吞吐量（Mbit/s）。
    pub send_rate_mbps: f64,
    pub recv_rate_mbps: f64,
    /// Fraction of sent packets reported lost, in `[0, 1]`.
    /// 已发送包中报告丢失的比例。
    pub loss_rate: f64,
    /// Smoothed round-trip time.
    /// 平滑的往返时间。
    pub rtt: Duration,
    /// Estimated link bandwidth in Mbit/s.
    /// 估计的链路带宽（Mbit/s）。
    pub bandwidth_mbps: f64,
    /// Packets currently in flight.
    /// 当前在途的包数。
    pub flight_size: u32,
    /// Bytes waiting in the send buffer / in the receive buffer.
    /// 发送缓冲区 / 接收缓冲区中的字节数。
    pub send_buffer_bytes: usize,
    pub recv_buffer_bytes: usize,
}

/// How the engine should schedule acknowledgments.
///
/// 引擎应如何调度确认。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// The engine's own policy.
    /// 使用引擎自身的策略。
    Engine,
    /// Acknowledge periodically.
    /// 周期性确认。
    Periodic(Duration),
    /// Acknowledge every `n` received packets.
    /// 每收到 `n` 个包确认一次。
    EveryPackets(u32),
}

/// Per-connection pacing state.
///
/// The send period and window are written by the bound algorithm through its
/// handle; everything else is measured and written by the engine.
///
/// 每个连接的发送节奏状态。
#[derive(Debug, Clone, PartialEq)]
pub struct PacingState {
    pkt_snd_period: f64,
    cwnd: f64,
    max_cwnd: f64,
    bandwidth: u32,
    mss: u32,
    snd_curr_seq: u32,
    rcv_rate: u32,
    rtt_us: u32,
}

impl PacingState {
    /// Inter-packet sending period in microseconds.
    /// 包发送间隔（微秒）。
    pub fn pkt_snd_period(&self) -> f64 {
        self.pkt_snd_period
    }

    /// Congestion window in packets.
    /// 拥塞窗口（包）。
    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }

    /// Upper bound of the congestion window in packets.
    pub fn max_cwnd(&self) -> f64 {
        self.max_cwnd
    }

    /// Estimated link bandwidth in packets per second; zero when unknown.
    pub fn bandwidth(&self) -> u32 {
        self.bandwidth
    }

    /// Maximum packet size in bytes, including headers.
    pub fn mss(&self) -> u32 {
        self.mss
    }

    /// The largest sequence number sent so far.
    pub fn snd_curr_seq(&self) -> u32 {
        self.snd_curr_seq
    }

    /// Packet arrival rate at the receiver in packets per second; zero when unknown.
    pub fn rcv_rate(&self) -> u32 {
        self.rcv_rate
    }

    /// Estimated round-trip time in microseconds.
    pub fn rtt_us(&self) -> u32 {
        self.rtt_us
    }
}

/// The capability object an algorithm uses to influence its connection.
///
/// 算法用来影响其连接的能力对象。
pub struct ControlHandle {
    pacing: PacingState,
    min_cwnd: f64,
    syn_interval: Duration,
    ack_mode: AckMode,
    rto_override: Option<Duration>,
    perf: Option<PerfSnapshot>,
    link: Arc<dyn EngineLink>,
}

impl fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlHandle")
            .field("pacing", &self.pacing)
            .field("ack_mode", &self.ack_mode)
            .field("rto_override", &self.rto_override)
            .finish_non_exhaustive()
    }
}

impl ControlHandle {
    pub(crate) fn new(config: &CongestionControlConfig, link: Arc<dyn EngineLink>) -> Self {
        let min_cwnd = config.min_cwnd_packets.max(f64::MIN_POSITIVE);
        Self {
            pacing: PacingState {
                pkt_snd_period: 1.0,
                cwnd: config.initial_cwnd_packets.max(min_cwnd),
                max_cwnd: config.max_cwnd_packets.max(min_cwnd),
                bandwidth: 0,
                mss: 1500,
                snd_curr_seq: 0,
                rcv_rate: 0,
                rtt_us: 100_000,
            },
            min_cwnd,
            syn_interval: config.syn_interval,
            ack_mode: AckMode::Engine,
            rto_override: None,
            perf: None,
            link,
        }
    }

    /// The connection's current pacing state.
    ///
    /// 连接当前的发送节奏状态。
    pub fn pacing(&self) -> &PacingState {
        &self.pacing
    }

    /// The protocol's SYN interval, copied from configuration.
    pub fn syn_interval(&self) -> Duration {
        self.syn_interval
    }

    /// Sets the inter-packet sending period in microseconds.
    ///
    /// Non-positive or non-finite values are rejected and the previous period
    /// is kept.
    ///
    /// 设置包发送间隔（微秒）。非正数或非有限值会被拒绝。
    pub fn set_pkt_snd_period(&mut self, period_us: f64) {
        if period_us.is_finite() && period_us > 0.0 {
            self.pacing.pkt_snd_period = period_us;
        } else {
            warn!(
                rejected = period_us,
                kept = self.pacing.pkt_snd_period,
                "Rejected invalid send period"
            );
        }
    }

    /// Sets the congestion window, clamped to `[min_cwnd, max_cwnd]`.
    ///
    /// 设置拥塞窗口，限制在 `[min_cwnd, max_cwnd]` 范围内。
    pub fn set_cwnd(&mut self, cwnd: f64) {
        if cwnd.is_nan() {
            warn!(kept = self.pacing.cwnd, "Rejected NaN congestion window");
            return;
        }
        self.pacing.cwnd = cwnd.clamp(self.min_cwnd, self.pacing.max_cwnd);
    }

    /// Switches the engine to periodic acknowledgment. The period never
    /// exceeds the SYN interval.
    ///
    /// 将引擎切换为周期性确认。周期不超过SYN间隔。
    pub fn set_ack_timer(&mut self, period: Duration) {
        let period = period.min(self.syn_interval);
        self.ack_mode = AckMode::Periodic(period);
        trace!(period_us = period.as_micros(), "ACK timer set");
    }

    /// Switches the engine to acknowledging every `packets` received packets.
    ///
    /// 将引擎切换为每收到 `packets` 个包确认一次。
    pub fn set_ack_interval(&mut self, packets: u32) {
        self.ack_mode = AckMode::EveryPackets(packets.max(1));
        trace!(packets, "ACK interval set");
    }

    /// Overrides the retransmission timeout the engine would compute.
    ///
    /// 覆盖引擎计算的重传超时。
    pub fn set_rto(&mut self, rto: Duration) {
        self.rto_override = Some(rto);
        trace!(rto_us = rto.as_micros(), "User-defined RTO set");
    }

    /// Sends a user-defined control packet on the owning connection.
    /// Delivery failures are logged and otherwise ignored.
    ///
    /// 在所属连接上发送用户自定义控制包。发送失败只会被记录。
    pub fn send_custom_msg(&self, packet: Packet) {
        if let Err(e) = self.link.send_custom_msg(packet) {
            warn!(error = %e, "Failed to send custom control message");
        }
    }

    /// Samples and returns the connection's performance snapshot, or `None`
    /// when the engine cannot provide one.
    ///
    /// 采样并返回连接的性能快照；引擎无法提供时返回 `None`。
    pub fn perf_info(&mut self) -> Option<&PerfSnapshot> {
        match self.link.sample_perf() {
            Ok(snapshot) => {
                self.perf = Some(snapshot);
                self.perf.as_ref()
            }
            Err(e) => {
                debug!(error = %e, "Performance snapshot unavailable");
                None
            }
        }
    }

    pub(crate) fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    pub(crate) fn rto_override(&self) -> Option<Duration> {
        self.rto_override
    }

    pub(crate) fn set_mss(&mut self, mss: u32) {
        self.pacing.mss = mss;
    }

    pub(crate) fn set_max_cwnd(&mut self, max_cwnd: f64) {
        self.pacing.max_cwnd = max_cwnd.max(self.min_cwnd);
        self.pacing.cwnd = self.pacing.cwnd.min(self.pacing.max_cwnd);
    }

    pub(crate) fn set_bandwidth(&mut self, bandwidth: u32) {
        self.pacing.bandwidth = bandwidth;
    }

    pub(crate) fn set_snd_curr_seq(&mut self, seq: u32) {
        self.pacing.snd_curr_seq = seq;
    }

    pub(crate) fn set_rcv_rate(&mut self, rcv_rate: u32) {
        self.pacing.rcv_rate = rcv_rate;
    }

    pub(crate) fn set_rtt(&mut self, rtt_us: u32) {
        self.pacing.rtt_us = rtt_us;
    }
}
