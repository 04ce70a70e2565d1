//! 定义了拥塞控制与就绪多路复用器的可配置参数。
//! Defines configurable parameters for congestion control and the readiness multiplexer.

use std::time::Duration;

/// A structure containing all configurable parameters of the core.
///
/// 包含核心所有可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Congestion control-related parameters.
    /// 拥塞控制相关参数。
    pub congestion_control: CongestionControlConfig,

    /// Readiness multiplexer parameters.
    /// 就绪多路复用器参数。
    pub epoll: EpollConfig,
}

/// Congestion control-related parameters.
///
/// These values are copied into every algorithm instance when it is created,
/// so changing a `Config` never affects connections that are already running.
///
/// 拥塞控制相关参数。
///
/// 这些值在每个算法实例创建时被复制进去，因此修改 `Config`
/// 不会影响已经在运行的连接。
#[derive(Debug, Clone)]
pub struct CongestionControlConfig {
    /// The tag of the algorithm a new connection is bound to.
    /// 新连接绑定的算法标签。
    pub algorithm: String,
    /// The protocol's synchronization interval (SYN). It is the rate control
    /// interval of the default algorithm and the upper bound of any ACK timer.
    ///
    /// 协议的同步间隔（SYN）。它是默认算法的速率控制间隔，也是任何ACK定时器的上限。
    pub syn_interval: Duration,
    /// The initial congestion window size in packets.
    /// 初始拥塞窗口大小（以包为单位）。
    pub initial_cwnd_packets: f64,
    /// The minimum congestion window size in packets.
    /// 最小拥塞窗口大小（以包为单位）。
    pub min_cwnd_packets: f64,
    /// The default maximum congestion window in packets, used until the engine
    /// reports the negotiated flow window.
    /// 默认的最大拥塞窗口（以包为单位），在引擎报告协商的流量窗口之前使用。
    pub max_cwnd_packets: f64,
    /// Multiplicative factor applied to the send period on every decrease.
    /// 每次降速时应用于发送周期的乘法因子。
    pub decrease_factor: f64,
    /// The maximum number of decreases within one congestion epoch.
    /// 一个拥塞周期内的最大降速次数。
    pub max_decreases_per_epoch: u32,
    /// The smallest per-interval rate increase, in packets.
    /// 每个间隔内最小的速率增量（以包为单位）。
    pub min_rate_increase: f64,
    /// The initial slow start threshold in packets, used by the Vegas algorithm.
    /// 初始慢启动阈值（以包为单位），由Vegas算法使用。
    pub initial_ssthresh: f64,
    /// The lower bound of the `diff` value in the Vegas algorithm. If the estimated
    /// number of queued packets is below this, the window is increased.
    /// Vegas算法中 `diff` 值的下限。如果估计的排队数据包数量低于此值，则增加窗口。
    pub vegas_alpha_packets: f64,
    /// The upper bound of the `diff` value in the Vegas algorithm. If the estimated
    /// number of queued packets is above this, the window is decreased.
    /// Vegas算法中 `diff` 值的上限。如果估计的排队数据包数量高于此值，则减小窗口。
    pub vegas_beta_packets: f64,
    /// The factor by which the congestion window is decreased during non-congestive
    /// packet loss events.
    /// 在非拥塞性丢包事件期间，拥塞窗口减小的因子。
    pub vegas_gentle_decrease_factor: f64,
}

/// Readiness multiplexer parameters.
///
/// 就绪多路复用器参数。
#[derive(Debug, Clone)]
pub struct EpollConfig {
    /// The maximum number of descriptors that may be registered at once.
    /// 同时可注册的最大描述符数量。
    pub max_descriptors: usize,
    /// How often a waiter re-polls its native descriptors while no transport
    /// socket is ready.
    /// 当没有传输套接字就绪时，等待者重新轮询本地描述符的频率。
    pub native_poll_interval: Duration,
    /// The number of native events collected per poll.
    /// 每次轮询收集的本地事件数量。
    pub native_event_capacity: usize,
}

impl Default for CongestionControlConfig {
    fn default() -> Self {
        Self {
            algorithm: "rate".to_string(),
            syn_interval: Duration::from_millis(10),
            initial_cwnd_packets: 2.0,
            min_cwnd_packets: 2.0,
            max_cwnd_packets: 25600.0,
            decrease_factor: 1.125,
            max_decreases_per_epoch: 5, // 1.125^5 keeps one epoch's shrink below ~1.8x
            min_rate_increase: 0.01,
            initial_ssthresh: 64.0,
            vegas_alpha_packets: 2.0,
            vegas_beta_packets: 4.0,
            vegas_gentle_decrease_factor: 0.8, // 20% decrease
        }
    }
}

impl Default for EpollConfig {
    fn default() -> Self {
        Self {
            max_descriptors: 1024,
            native_poll_interval: Duration::from_millis(10),
            native_event_capacity: 64,
        }
    }
}
