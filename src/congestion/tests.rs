//! Tests for the rate-based congestion controller.
use super::{
    handle::{AckMode, ControlHandle},
    rate::RateControl,
    test_utils::{connected_driver, init_tracing, RecordingLink},
    CongestionControl, CongestionDriver,
};
use crate::{config::CongestionControlConfig, packet::loss::LOSS_RANGE_FLAG};
use std::{sync::Arc, time::Duration};

const SYN: Duration = Duration::from_millis(10);

fn test_config() -> CongestionControlConfig {
    CongestionControlConfig {
        initial_cwnd_packets: 2.0,
        min_cwnd_packets: 2.0,
        ..Default::default()
    }
}

fn rate_driver(seed: u64, snd_curr_seq: u32) -> CongestionDriver {
    let (driver, _) = connected_driver(
        Box::new(RateControl::with_seed(test_config(), seed)),
        &test_config(),
        snd_curr_seq,
    );
    driver
}

/// An initialized algorithm and its handle, for tests that inspect internal state.
fn bare(seed: u64, snd_curr_seq: u32) -> (RateControl, ControlHandle) {
    init_tracing();
    let mut cc = ControlHandle::new(&test_config(), Arc::new(RecordingLink::default()));
    cc.set_snd_curr_seq(snd_curr_seq);
    let mut algo = RateControl::with_seed(test_config(), seed);
    algo.init(&mut cc);
    (algo, cc)
}

/// Drives a connection out of slow start with its first loss report.
/// Afterwards: period 500us, bandwidth 10_000 pkt/s, last decrease seq 999.
fn congestion_avoidance_driver(seed: u64) -> CongestionDriver {
    let mut driver = rate_driver(seed, 1_000);
    driver.set_bandwidth(10_000);
    driver.set_rtt(50_000);
    driver.set_rcv_rate(2_000);
    driver.on_loss(&[990]);
    driver
}

fn decreased(period: f64, times: usize) -> f64 {
    (0..times).fold(period, |p, _| (p * 1.125).ceil())
}

#[test]
fn test_init_enters_slow_start() {
    let driver = rate_driver(1, 0);
    assert_eq!(driver.pacing().cwnd(), 2.0);
    assert_eq!(driver.pacing().pkt_snd_period(), 1.0);
    assert_eq!(driver.ack_mode(), AckMode::Periodic(SYN));
    assert_eq!(driver.algorithm_name(), "rate");

    let (algo, _) = bare(1, 0);
    assert!(algo.in_slow_start());
    assert_eq!(algo.nak_count, 0);
    assert_eq!(algo.dec_count, 0);
    assert_eq!(algo.decrease_threshold(), 1);
}

#[test]
fn test_init_uses_bandwidth_estimate() {
    init_tracing();
    let mut driver = CongestionDriver::new(
        Box::new(RateControl::with_seed(test_config(), 1)),
        &test_config(),
        Arc::new(RecordingLink::default()),
    );
    driver.set_bandwidth(8_000);
    driver.on_connect();
    assert_eq!(driver.pacing().pkt_snd_period(), 125.0);
}

#[test]
fn test_slow_start_grows_by_acked_packets() {
    let mut driver = rate_driver(1, 0);
    driver.on_ack(10);
    assert_eq!(driver.pacing().cwnd(), 12.0);

    // A stale or duplicate ACK adds nothing.
    driver.on_ack(10);
    driver.on_ack(4);
    assert_eq!(driver.pacing().cwnd(), 12.0);

    driver.on_ack(15);
    assert_eq!(driver.pacing().cwnd(), 17.0);
}

#[test]
fn test_slow_start_exit_at_max_window() {
    let mut driver = rate_driver(1, 0);
    driver.set_max_cwnd(20.0);
    driver.set_rcv_rate(4_000);

    driver.on_ack(30);
    assert_eq!(driver.pacing().cwnd(), 20.0);
    // Pacing switches to the receiver's measured rate.
    assert_eq!(driver.pacing().pkt_snd_period(), 250.0);
}

#[test]
fn test_slow_start_exit_without_receive_rate() {
    let mut driver = rate_driver(1, 0);
    driver.set_max_cwnd(20.0);
    driver.set_rtt(90_000);

    driver.on_ack(18);
    // (rtt + rc_interval) / cwnd = (90_000 + 10_000) / 20
    assert_eq!(driver.pacing().pkt_snd_period(), 5_000.0);
}

#[tokio::test(start_paused = true)]
async fn test_first_loss_ends_slow_start() {
    let mut driver = rate_driver(1, 100);
    driver.set_rcv_rate(1_000);
    driver.on_loss(&[50]);
    assert_eq!(driver.pacing().pkt_snd_period(), 1_000.0);

    // Further ACKs no longer grow the window additively.
    driver.on_ack(130);
    assert_eq!(driver.pacing().cwnd(), 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_increase_waits_for_interval() {
    let mut driver = congestion_avoidance_driver(1);
    assert_eq!(driver.pacing().pkt_snd_period(), 500.0);

    // Within the first interval nothing changes.
    tokio::time::advance(Duration::from_millis(3)).await;
    driver.on_ack(1_001);
    assert_eq!(driver.pacing().pkt_snd_period(), 500.0);

    // Once the interval elapsed the period shrinks: spare bandwidth is capped
    // at 10_000 / 9 packets/s, which gives an increase of 0.1 packets.
    tokio::time::advance(Duration::from_millis(7)).await;
    driver.on_ack(1_002);
    let expected = 500.0 * 10_000.0 / (500.0 * 0.1 + 10_000.0);
    assert!((driver.pacing().pkt_snd_period() - expected).abs() < 1e-9);

    // And the next interval starts over.
    driver.on_ack(1_003);
    assert!((driver.pacing().pkt_snd_period() - expected).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_loss_holds_rate_for_one_interval() {
    let mut driver = congestion_avoidance_driver(1);
    driver.on_loss(&[995]);
    let after_loss = driver.pacing().pkt_snd_period();

    tokio::time::advance(SYN).await;
    driver.on_ack(1_001);
    assert_eq!(driver.pacing().pkt_snd_period(), after_loss);

    tokio::time::advance(SYN).await;
    driver.on_ack(1_002);
    assert!(driver.pacing().pkt_snd_period() < after_loss);
}

#[tokio::test(start_paused = true)]
async fn test_rate_growth_is_concave() {
    let mut driver = congestion_avoidance_driver(1);

    let mut rate = 1_000_000.0 / driver.pacing().pkt_snd_period();
    let mut gains = Vec::new();
    for i in 0..200u32 {
        tokio::time::advance(SYN).await;
        driver.on_ack(1_001 + i);
        let next = 1_000_000.0 / driver.pacing().pkt_snd_period();
        gains.push((next - rate) / rate);
        rate = next;
    }

    assert!(rate > 2_000.0);
    // Relative growth never increases as the rate widens.
    for pair in gains.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-12, "gains grew: {:?}", pair);
    }
}

#[tokio::test(start_paused = true)]
async fn test_window_follows_receive_rate_in_congestion_avoidance() {
    let mut driver = congestion_avoidance_driver(1);
    tokio::time::advance(SYN).await;
    driver.on_ack(1_001);
    // 2_000 pkt/s * (50ms + 10ms) + 16
    assert!((driver.pacing().cwnd() - 136.0).abs() < 1e-9);
}

#[test]
fn test_new_epoch_decreases_rate() {
    let mut driver = congestion_avoidance_driver(1);

    driver.set_snd_curr_seq(1_200);
    driver.on_loss(&[1_100 | LOSS_RANGE_FLAG, 1_110]);
    assert_eq!(driver.pacing().pkt_snd_period(), 563.0); // ceil(500 * 1.125)
}

#[test]
fn test_send_interval_saturates_under_sustained_loss() {
    let mut driver = congestion_avoidance_driver(1);

    // Every report lies past the last decrease point and opens an epoch.
    let mut seq = 1_000;
    for _ in 0..600 {
        seq += 10;
        driver.set_snd_curr_seq(seq);
        driver.on_loss(&[seq - 5]);
    }

    let period = driver.pacing().pkt_snd_period();
    assert!(period.is_finite() && period > 1e30, "period {period}");
    assert_eq!(driver.send_interval(), Duration::MAX);
}

#[test]
fn test_epoch_opening_resets_counters() {
    let (mut algo, mut cc) = bare(9, 1_000);
    algo.slow_start = false;
    cc.set_pkt_snd_period(100.0);

    cc.set_snd_curr_seq(1_500);
    algo.on_loss(&mut cc, &[1_200]);
    for _ in 0..3 {
        algo.on_loss(&mut cc, &[1_300]);
    }
    assert_eq!(algo.dec_count, 4);
    assert_eq!(algo.nak_count, 4);

    cc.set_snd_curr_seq(3_000);
    algo.on_loss(&mut cc, &[2_000]);
    assert_eq!(algo.dec_count, 1);
    assert_eq!(algo.nak_count, 1);
    assert_eq!(algo.last_dec_seq, 3_000);
    // ceil(0 * 0.875 + 4 * 0.125)
    assert_eq!(algo.avg_nak_num(), 1);
}

#[test]
fn test_one_decrease_per_threshold_within_epoch() {
    for seed in 0..32u64 {
        let (mut algo, mut cc) = bare(seed, 1_000);
        algo.slow_start = false;
        algo.avg_nak_num = 6;
        algo.nak_count = 6;
        cc.set_pkt_snd_period(100.0);

        cc.set_snd_curr_seq(2_000);
        algo.on_loss(&mut cc, &[1_500]);
        let threshold = algo.decrease_threshold();
        assert!((1..=6).contains(&threshold));
        let opened = cc.pacing().pkt_snd_period();
        assert_eq!(opened, 113.0);

        for _ in 0..10 {
            algo.on_loss(&mut cc, &[1_200]);
        }
        // Reports 2..=5 of the epoch are counted; only multiples of the
        // threshold decrease, and the cap ignores everything after.
        let expected = (2..=5u32).filter(|n| n % threshold == 0).count();
        assert_eq!(
            cc.pacing().pkt_snd_period(),
            decreased(opened, expected),
            "seed {seed}, threshold {threshold}"
        );
    }
}

#[test]
fn test_losses_inside_epoch_respect_cap() {
    let mut driver = rate_driver(3, 1_000);
    driver.set_rcv_rate(1_000);
    driver.on_loss(&[500]);

    driver.set_snd_curr_seq(2_000);
    driver.on_loss(&[1_500]);
    let opened = driver.pacing().pkt_snd_period();
    assert_eq!(opened, 1_125.0);

    // Without NAK history the threshold is one, so each report inside the
    // epoch decreases until the per-epoch cap of five is reached.
    for _ in 0..20 {
        driver.on_loss(&[1_000]);
    }
    assert_eq!(driver.pacing().pkt_snd_period(), decreased(opened, 4));
}

#[test]
fn test_timeout_returns_to_slow_start() {
    let mut driver = congestion_avoidance_driver(1);
    driver.on_timeout();
    assert_eq!(driver.pacing().cwnd(), 2.0);
    assert_eq!(driver.pacing().pkt_snd_period(), 100.0); // 1e6 / 10_000 pkt/s

    // Additive growth is back.
    driver.on_ack(1_010);
    assert_eq!(driver.pacing().cwnd(), 12.0);
}

#[tokio::test(start_paused = true)]
async fn test_pacing_stays_positive_and_slow_start_never_returns() {
    let (mut algo, mut cc) = bare(11, 0);
    cc.set_bandwidth(50_000);
    cc.set_max_cwnd(64.0);
    cc.set_rtt(20_000);

    let mut seq = 0u32;
    let mut left_slow_start = false;
    for step in 0..2_000u32 {
        seq = (seq + 7) & 0x7FFF_FFFF;
        cc.set_snd_curr_seq(seq);
        cc.set_rcv_rate((step * 37) % 9_000);
        tokio::time::advance(Duration::from_millis((step % 13) as u64)).await;

        match step % 5 {
            0..=2 => algo.on_ack(&mut cc, seq),
            3 => algo.on_loss(&mut cc, &[seq.saturating_sub(step % 50)]),
            _ => algo.on_loss(&mut cc, &[seq.saturating_sub(3) | LOSS_RANGE_FLAG, seq]),
        }

        let pacing = cc.pacing();
        assert!(pacing.pkt_snd_period() > 0.0, "step {step}");
        assert!(pacing.cwnd() >= 2.0 && pacing.cwnd() <= 64.0, "step {step}");

        if left_slow_start {
            assert!(!algo.in_slow_start(), "slow start re-entered at step {step}");
        }
        left_slow_start |= !algo.in_slow_start();
    }
    assert!(left_slow_start);

    algo.on_timeout(&mut cc);
    assert!(algo.in_slow_start());
}

#[test]
fn test_threshold_distribution_is_uniform_over_average() {
    // Flows sharing a bottleneck should spread their thresholds over
    // [1, avg] rather than back off in lockstep.
    let mut counts = std::collections::BTreeMap::new();
    for seed in 0..800u64 {
        let (mut algo, mut cc) = bare(seed, 0);
        algo.slow_start = false;
        algo.avg_nak_num = 8;
        algo.nak_count = 8;
        cc.set_snd_curr_seq(10);
        algo.on_loss(&mut cc, &[5]);
        *counts.entry(algo.decrease_threshold()).or_insert(0u32) += 1;
    }

    assert_eq!(counts.keys().copied().collect::<Vec<_>>(), (1..=8).collect::<Vec<_>>());
    for (&threshold, &n) in &counts {
        // Expected 100 each; allow well over four standard deviations.
        assert!((50..=150).contains(&n), "threshold {threshold} drawn {n} times");
    }
}
