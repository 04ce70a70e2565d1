//! tests/common/harness.rs
use kestrel_flow::{
    congestion::{AlgorithmRegistry, CongestionDriver, EngineLink, PerfSnapshot},
    config::CongestionControlConfig,
    error::{Error, Result},
    packet::Packet,
};
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::fmt::format::FmtSpan;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "kestrel_flow=debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::FULL)
            .with_test_writer()
            .try_init();
    });
}

/// A stand-in for the transport engine's side of a connection.
///
/// Custom messages are recorded instead of sent, and the performance snapshot
/// is whatever the test last stored.
#[derive(Debug, Default)]
pub struct EngineStub {
    sent: Mutex<Vec<Packet>>,
    perf: Mutex<Option<PerfSnapshot>>,
}

impl EngineStub {
    pub fn sent(&self) -> Vec<Packet> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_perf(&self, perf: PerfSnapshot) {
        *self.perf.lock().unwrap() = Some(perf);
    }
}

impl EngineLink for EngineStub {
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

/// A connection's congestion control as the engine sees it.
pub struct TestConnection {
    pub driver: CongestionDriver,
    pub engine: Arc<EngineStub>,
}

impl TestConnection {
    /// Binds the algorithm selected by `config` and delivers the connect event.
    pub fn connect(
        registry: &AlgorithmRegistry,
        config: &CongestionControlConfig,
        snd_curr_seq: u32,
    ) -> Result<Self> {
        init_tracing();
        let engine = Arc::new(EngineStub::default());
        let mut driver = CongestionDriver::from_registry(registry, config, engine.clone())?;
        driver.set_mss(1500);
        driver.set_snd_curr_seq(snd_curr_seq);
        driver.on_connect();
        Ok(Self { driver, engine })
    }
}
