//! An implementation of a Vegas-like, latency-based congestion control algorithm.
//!
//! 一个类Vegas、基于延迟的拥塞控制算法的实现。
//!
//! Unlike [`RateControl`](super::RateControl) this one is purely window-based:
//! the send period stays at its minimum and the window alone limits sending.

use super::{factory::FromConfig, handle::ControlHandle, CongestionControl};
use crate::config::CongestionControlConfig;
use std::time::Duration;
use tracing::{debug, trace};

/// Window-based algorithms want an ACK for every other packet.
const ACK_EVERY_PACKETS: u32 = 2;

/// The state of the congestion controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    SlowStart,
    CongestionAvoidance,
}

/// A Vegas-like congestion controller.
///
/// 一个类Vegas的拥塞控制器。
#[derive(Debug)]
pub struct Vegas {
    pub(super) slow_start_threshold: f64,

    pub(super) state: State,

    pub(super) min_rtt: Duration,

    /// The last measured RTT. Used to help determine the nature of packet loss.
    last_rtt: Option<Duration>,

    config: CongestionControlConfig,
}

impl Vegas {
    pub fn new(config: CongestionControlConfig) -> Self {
        Self {
            slow_start_threshold: config.initial_ssthresh,
            state: State::SlowStart,
            min_rtt: Duration::MAX,
            last_rtt: None,
            config,
        }
    }

    fn sample_rtt(&mut self, cc: &ControlHandle) -> Option<Duration> {
        let rtt = Duration::from_micros(cc.pacing().rtt_us() as u64);
        if rtt.is_zero() {
            return None;
        }
        self.last_rtt = Some(rtt);
        self.min_rtt = self.min_rtt.min(rtt);
        Some(rtt)
    }

    fn enter_slow_start(&mut self, cc: &mut ControlHandle) {
        self.slow_start_threshold = (cc.pacing().cwnd() / 2.0).max(self.config.min_cwnd_packets);
        cc.set_cwnd(self.slow_start_threshold);
        self.state = State::SlowStart;
    }
}

impl FromConfig for Vegas {
    const NAME: &'static str = "vegas";

    fn from_config(config: &CongestionControlConfig) -> Self {
        Self::new(config.clone())
    }
}

impl CongestionControl for Vegas {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn init(&mut self, cc: &mut ControlHandle) {
        cc.set_ack_interval(ACK_EVERY_PACKETS);
        cc.set_pkt_snd_period(1.0);
        cc.set_cwnd(self.config.initial_cwnd_packets);
        self.state = State::SlowStart;
        self.slow_start_threshold = self.config.initial_ssthresh;
    }

    fn on_ack(&mut self, cc: &mut ControlHandle, _ack: u32) {
        let Some(rtt) = self.sample_rtt(cc) else {
            return;
        };
        let cwnd = cc.pacing().cwnd();

        if self.state == State::SlowStart {
            cc.set_cwnd(cwnd + 1.0);
            trace!(cwnd = cc.pacing().cwnd(), "Slow Start: cwnd increased");
            if cc.pacing().cwnd() >= self.slow_start_threshold {
                self.state = State::CongestionAvoidance;
                trace!("State changed to CongestionAvoidance");
            }
            return;
        }

        // Congestion Avoidance using the Alpha-Beta mechanism.
        let expected_throughput = cwnd / self.min_rtt.as_secs_f64();
        let actual_throughput = cwnd / rtt.as_secs_f64();
        let diff_packets = (expected_throughput - actual_throughput) * self.min_rtt.as_secs_f64();

        if diff_packets < self.config.vegas_alpha_packets {
            cc.set_cwnd(cwnd + 1.0);
            trace!(
                cwnd = cc.pacing().cwnd(),
                diff = diff_packets,
                alpha = self.config.vegas_alpha_packets,
                "Congestion Avoidance: increasing cwnd"
            );
        } else if diff_packets > self.config.vegas_beta_packets {
            cc.set_cwnd(cwnd - 1.0);
            trace!(
                cwnd = cc.pacing().cwnd(),
                diff = diff_packets,
                beta = self.config.vegas_beta_packets,
                "Congestion Avoidance: decreasing cwnd"
            );
        } else {
            // Window is in the optimal range, do nothing.
            trace!(cwnd, diff = diff_packets, "Congestion Avoidance: cwnd stable");
        }
    }

    fn on_loss(&mut self, cc: &mut ControlHandle, _loss_list: &[u32]) {
        // To differentiate between congestive and non-congestive loss, we check
        // if the last RTT was significantly higher than the minimum RTT.
        // If we haven't measured an RTT yet, conservatively assume it's congestive.
        let is_congestive_loss = match self.last_rtt {
            None => true,
            Some(last) => last > self.min_rtt + (self.min_rtt / 5),
        };

        if is_congestive_loss {
            self.enter_slow_start(cc);
            debug!(
                ssthresh = self.slow_start_threshold,
                cwnd = cc.pacing().cwnd(),
                "Congestive loss detected"
            );
        } else {
            let cwnd = cc.pacing().cwnd() * self.config.vegas_gentle_decrease_factor;
            cc.set_cwnd(cwnd);
            debug!(cwnd = cc.pacing().cwnd(), "Non-congestive loss, gently reducing cwnd");
        }
    }

    fn on_timeout(&mut self, cc: &mut ControlHandle) {
        self.enter_slow_start(cc);
        cc.set_cwnd(self.config.min_cwnd_packets);
        debug!(ssthresh = self.slow_start_threshold, "Timeout, cwnd collapsed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::congestion::{handle::AckMode, test_utils::connected_driver};

    fn test_config() -> CongestionControlConfig {
        CongestionControlConfig {
            initial_cwnd_packets: 2.0,
            min_cwnd_packets: 2.0,
            initial_ssthresh: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_vegas_slow_start() {
        let (mut driver, _) = connected_driver(Box::new(Vegas::new(test_config())), &test_config(), 0);
        driver.set_rtt(100_000);

        assert_eq!(driver.pacing().cwnd(), 2.0);
        assert_eq!(driver.ack_mode(), AckMode::EveryPackets(2));

        // Each ACK in slow start should increase cwnd by 1
        driver.on_ack(1);
        assert_eq!(driver.pacing().cwnd(), 3.0);
        driver.on_ack(2);
        assert_eq!(driver.pacing().cwnd(), 4.0);
    }

    #[test]
    fn test_vegas_without_rtt_sample_holds_window() {
        let (mut driver, _) = connected_driver(Box::new(Vegas::new(test_config())), &test_config(), 0);
        driver.set_rtt(0);
        driver.on_ack(1);
        assert_eq!(driver.pacing().cwnd(), 2.0);
    }

    #[test]
    fn test_vegas_congestion_avoidance_and_loss() {
        let (mut driver, _) = connected_driver(Box::new(Vegas::new(test_config())), &test_config(), 0);
        driver.set_rtt(100_000);
        for ack in 1..=8 {
            driver.on_ack(ack);
        }
        // cwnd reached ssthresh (10) and moved to congestion avoidance.
        assert_eq!(driver.pacing().cwnd(), 10.0);

        // Stable RTT: diff is zero, below alpha, so the window keeps growing.
        driver.on_ack(9);
        assert_eq!(driver.pacing().cwnd(), 11.0);

        // RTT jumps by 50%: loss is considered congestive, window halves.
        driver.set_rtt(150_000);
        driver.on_ack(10);
        driver.on_loss(&[5]);
        assert!(driver.pacing().cwnd() <= 5.5);
        assert!(driver.pacing().cwnd() >= 2.0);
    }

    #[test]
    fn test_vegas_timeout_collapses_window() {
        let (mut driver, _) = connected_driver(Box::new(Vegas::new(test_config())), &test_config(), 0);
        driver.set_rtt(100_000);
        for ack in 1..=6 {
            driver.on_ack(ack);
        }
        driver.on_timeout();
        assert_eq!(driver.pacing().cwnd(), 2.0);
    }
}
