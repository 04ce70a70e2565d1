//! Shared helpers for congestion control tests.

use super::{CongestionControl, CongestionDriver, EngineLink, PerfSnapshot};
use crate::{
    config::CongestionControlConfig,
    error::{Error, Result},
    packet::Packet,
};
use std::sync::{Arc, Mutex};

pub(crate) use crate::testing::init_tracing;

/// An engine link that records custom messages and serves a preset snapshot.
#[derive(Debug, Default)]
pub(crate) struct RecordingLink {
    sent: Mutex<Vec<Packet>>,
    perf: Mutex<Option<PerfSnapshot>>,
}

impl RecordingLink {
    pub(crate) fn sent(&self) -> Vec<Packet> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn set_perf(&self, perf: PerfSnapshot) {
        *self.perf.lock().unwrap() = Some(perf);
    }
}

impl EngineLink for RecordingLink {
    fn send_custom_msg(&self, packet: Packet) -> Result<()> {
        self.sent.lock().unwrap().push(packet);
        Ok(())
    }

    fn sample_perf(&self) -> Result<PerfSnapshot> {
        self.perf
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Io(std::io::ErrorKind::NotConnected.into()))
    }
}

/// Builds a connected driver around `algorithm` with a fresh recording link.
pub(crate) fn connected_driver(
    algorithm: Box<dyn CongestionControl>,
    config: &CongestionControlConfig,
    snd_curr_seq: u32,
) -> (CongestionDriver, Arc<RecordingLink>) {
    init_tracing();
    let link = Arc::new(RecordingLink::default());
    let mut driver = CongestionDriver::new(algorithm, config, link.clone());
    driver.set_mss(1500);
    driver.set_snd_curr_seq(snd_curr_seq);
    driver.on_connect();
    (driver, link)
}
