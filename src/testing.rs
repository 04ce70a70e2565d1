//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use std::sync::Once;

/// Initializes tracing for tests, ensuring it's only done once.
pub(crate) fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "kestrel_flow=debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
