use std::sync::Once;

static INIT: Once = Once::new();

/// Initialises env_logger once per test binary. Honours RUST_LOG and stays
/// quiet (warn) otherwise.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .is_test(true)
            .try_init();
    });
}
