//! 默认的基于速率的拥塞控制算法
//! The default rate-based congestion control algorithm.
//!
//! Two phases. In slow start the window grows by the number of newly
//! acknowledged packets and sending is window-limited. Once the window reaches
//! its ceiling (or the first loss or timeout arrives) the algorithm switches to
//! rate-based pacing: every rate control interval the send period shrinks by
//! an amount derived from the spare link bandwidth, and loss reports grow it
//! multiplicatively, at most a few times per congestion epoch and only on a
//! randomized fraction of the reports.

use super::{factory::FromConfig, handle::ControlHandle, CongestionControl};
use crate::{
    config::CongestionControlConfig,
    packet::{
        loss::first_lost,
        seq::{seq_cmp, seq_dec, seq_off},
    },
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Scale of the per-interval increase: 1.5 * 10^-6 packets per bit/s of spare bandwidth.
const INCREASE_BETA: f64 = 0.000_001_5;

/// Packets added to the rate-derived window to cover ACK jitter.
const WINDOW_HEADROOM: f64 = 16.0;

/// Rate-based AIMD congestion control with slow start.
///
/// 带慢启动的基于速率的AIMD拥塞控制。
#[derive(Debug)]
pub struct RateControl {
    config: CongestionControlConfig,
    /// Rate control interval in microseconds.
    pub(super) rc_interval: f64,
    /// When the rate was last increased.
    pub(super) last_rc_time: Instant,
    pub(super) slow_start: bool,
    pub(super) last_ack: u32,
    /// Whether a loss was reported since the last rate increase.
    pub(super) loss: bool,
    /// The largest sequence number sent when the period was last increased.
    pub(super) last_dec_seq: u32,
    /// The send period before the last epoch-opening decrease.
    pub(super) last_dec_period: f64,
    pub(super) nak_count: u32,
    /// Every `dec_random`-th loss report of an epoch triggers another decrease.
    pub(super) dec_random: u32,
    pub(super) avg_nak_num: u32,
    pub(super) dec_count: u32,
    rng: StdRng,
}

impl RateControl {
    /// Creates a new algorithm instance. Decrease thresholds are drawn from a
    /// per-connection generator seeded by the OS.
    ///
    /// 创建新的算法实例。降速阈值来自由操作系统播种的每连接随机数生成器。
    pub fn new(config: CongestionControlConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Creates a new algorithm instance with a deterministic generator.
    ///
    /// 使用确定性随机数生成器创建新的算法实例。
    pub fn with_seed(config: CongestionControlConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: CongestionControlConfig, rng: StdRng) -> Self {
        Self {
            rc_interval: config.syn_interval.as_micros() as f64,
            config,
            last_rc_time: Instant::now(),
            slow_start: true,
            last_ack: 0,
            loss: false,
            last_dec_seq: seq_dec(0),
            last_dec_period: 1.0,
            nak_count: 0,
            dec_random: 1,
            avg_nak_num: 0,
            dec_count: 0,
            rng,
        }
    }

    /// Whether the algorithm is still in slow start.
    pub fn in_slow_start(&self) -> bool {
        self.slow_start
    }

    /// The randomized loss-report threshold of the current epoch.
    pub fn decrease_threshold(&self) -> u32 {
        self.dec_random
    }

    /// The smoothed number of loss reports per congestion epoch.
    pub fn avg_nak_num(&self) -> u32 {
        self.avg_nak_num
    }

    /// The send period to start from: the a-priori bandwidth estimate when the
    /// engine has one, otherwise effectively unpaced.
    fn initial_period(&self, cc: &ControlHandle) -> f64 {
        match cc.pacing().bandwidth() {
            0 => 1.0,
            bw => 1_000_000.0 / bw as f64,
        }
    }

    /// Leaves slow start and derives the send period from the measured
    /// receive rate, or from the window and RTT when none is known yet.
    fn exit_slow_start(&mut self, cc: &mut ControlHandle) {
        self.slow_start = false;
        let pacing = cc.pacing();
        let period = if pacing.rcv_rate() > 0 {
            1_000_000.0 / pacing.rcv_rate() as f64
        } else {
            (pacing.rtt_us() as f64 + self.rc_interval) / pacing.cwnd()
        };
        cc.set_pkt_snd_period(period);
        debug!(
            cwnd = cc.pacing().cwnd(),
            period_us = cc.pacing().pkt_snd_period(),
            rcv_rate = cc.pacing().rcv_rate(),
            "Slow start finished, switching to rate-based pacing"
        );
    }

    /// The number of packets per interval the rate grows by.
    fn rate_increase(&self, cc: &ControlHandle) -> f64 {
        let pacing = cc.pacing();
        let min_inc = self.config.min_rate_increase;
        let bandwidth = pacing.bandwidth() as i64;
        let period = pacing.pkt_snd_period();

        let mut spare = (bandwidth as f64 - 1_000_000.0 / period) as i64;
        // Above the last decrease point, probe no faster than a ninth of the link.
        if period > self.last_dec_period && bandwidth / 9 < spare {
            spare = bandwidth / 9;
        }
        if spare <= 0 {
            return min_inc;
        }

        let mss = pacing.mss().max(1) as f64;
        let inc = 10f64.powf((spare as f64 * mss * 8.0).log10().ceil()) * INCREASE_BETA / mss;
        inc.max(min_inc)
    }

    fn decrease_period(&self, cc: &mut ControlHandle) {
        let period = (cc.pacing().pkt_snd_period() * self.config.decrease_factor).ceil();
        cc.set_pkt_snd_period(period);
    }

    /// Draws the loss-report threshold of a new epoch, uniform in `[1, avg_nak_num]`.
    fn draw_threshold(&mut self) -> u32 {
        let scaled = (self.avg_nak_num as f64 * self.rng.random::<f64>()).ceil() as u32;
        scaled.max(1)
    }
}

impl FromConfig for RateControl {
    const NAME: &'static str = "rate";

    fn from_config(config: &CongestionControlConfig) -> Self {
        Self::new(config.clone())
    }
}

impl CongestionControl for RateControl {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn init(&mut self, cc: &mut ControlHandle) {
        self.rc_interval = self.config.syn_interval.as_micros() as f64;
        self.last_rc_time = Instant::now();
        cc.set_ack_timer(self.config.syn_interval);

        self.slow_start = true;
        self.last_ack = cc.pacing().snd_curr_seq();
        self.loss = false;
        self.last_dec_seq = seq_dec(self.last_ack);
        self.last_dec_period = 1.0;
        self.avg_nak_num = 0;
        self.nak_count = 0;
        self.dec_count = 0;
        self.dec_random = 1;

        cc.set_cwnd(self.config.initial_cwnd_packets);
        let period = self.initial_period(cc);
        cc.set_pkt_snd_period(period);

        debug!(
            cwnd = cc.pacing().cwnd(),
            period_us = cc.pacing().pkt_snd_period(),
            mss = cc.pacing().mss(),
            "Rate control initialized in slow start"
        );
    }

    fn on_ack(&mut self, cc: &mut ControlHandle, ack: u32) {
        let acked = seq_off(self.last_ack, ack);

        if self.slow_start {
            if acked <= 0 {
                trace!(ack, last_ack = self.last_ack, "Slow start: stale ACK ignored");
                return;
            }
            self.last_ack = ack;
            cc.set_cwnd(cc.pacing().cwnd() + acked as f64);
            trace!(cwnd = cc.pacing().cwnd(), acked, "Slow start: cwnd increased");

            if cc.pacing().cwnd() >= cc.pacing().max_cwnd() {
                self.exit_slow_start(cc);
            }
            return;
        }

        if acked > 0 {
            self.last_ack = ack;
        }

        let now = Instant::now();
        if (now.duration_since(self.last_rc_time).as_micros() as f64) < self.rc_interval {
            return;
        }
        self.last_rc_time = now;

        let pacing = cc.pacing();
        let cwnd = pacing.rcv_rate() as f64 / 1_000_000.0
            * (pacing.rtt_us() as f64 + self.rc_interval)
            + WINDOW_HEADROOM;
        cc.set_cwnd(cwnd);

        if self.loss {
            self.loss = false;
            trace!("Congestion avoidance: loss in last interval, rate held");
            return;
        }

        let inc = self.rate_increase(cc);
        let period = cc.pacing().pkt_snd_period();
        cc.set_pkt_snd_period(period * self.rc_interval / (period * inc + self.rc_interval));
        trace!(
            cwnd = cc.pacing().cwnd(),
            period_us = cc.pacing().pkt_snd_period(),
            inc,
            "Congestion avoidance: rate increased"
        );
    }

    fn on_loss(&mut self, cc: &mut ControlHandle, loss_list: &[u32]) {
        if self.slow_start {
            self.exit_slow_start(cc);
            if cc.pacing().rcv_rate() > 0 {
                return;
            }
        }

        self.loss = true;

        let Some(first) = first_lost(loss_list) else {
            return;
        };

        if seq_cmp(first, self.last_dec_seq) > 0 {
            // A loss beyond the last decrease point opens a new congestion epoch.
            self.last_dec_period = cc.pacing().pkt_snd_period();
            self.decrease_period(cc);

            self.avg_nak_num = (self.avg_nak_num as f64 * 0.875 + self.nak_count as f64 * 0.125)
                .ceil() as u32;
            self.nak_count = 1;
            self.dec_count = 1;
            self.last_dec_seq = cc.pacing().snd_curr_seq();
            self.dec_random = self.draw_threshold();

            debug!(
                first_lost = first,
                period_us = cc.pacing().pkt_snd_period(),
                avg_nak = self.avg_nak_num,
                threshold = self.dec_random,
                "New congestion epoch, rate decreased"
            );
        } else if self.dec_count < self.config.max_decreases_per_epoch {
            self.dec_count += 1;
            self.nak_count += 1;
            if self.nak_count % self.dec_random == 0 {
                self.decrease_period(cc);
                self.last_dec_seq = cc.pacing().snd_curr_seq();
                trace!(
                    nak_count = self.nak_count,
                    dec_count = self.dec_count,
                    period_us = cc.pacing().pkt_snd_period(),
                    "Loss within epoch, rate decreased"
                );
            }
        }
    }

    fn on_timeout(&mut self, cc: &mut ControlHandle) {
        self.slow_start = true;
        self.loss = false;
        self.nak_count = 0;
        self.dec_count = 0;
        self.dec_random = 1;
        self.last_dec_seq = seq_dec(self.last_ack);
        self.last_rc_time = Instant::now();

        cc.set_cwnd(self.config.initial_cwnd_packets);
        let period = self.initial_period(cc);
        cc.set_pkt_snd_period(period);

        debug!(
            cwnd = cc.pacing().cwnd(),
            period_us = cc.pacing().pkt_snd_period(),
            "Timeout, back to slow start"
        );
    }
}
