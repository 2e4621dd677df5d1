use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// Non-panicking variant of [`get_config`]
pub fn try_get_config() -> Option<Arc<StaticConfig>> {
    CONFIG.get().map(|c| c.load_full())
}

/// Install the global configuration
///
/// The first call wins; later calls keep the already installed value so
/// tests and the binary can both call this without coordination.
///
/// # Examples
/// ```no_run
/// use linkgate::config::{StaticConfig, init_config};
/// init_config(StaticConfig::load().expect("invalid config"));
/// ```
pub fn init_config(config: StaticConfig) {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(config));
}
