#![deny(unsafe_code)]

//! Configuration, path probing and page-cache eviction for the cachectl daemon.

pub mod config;
pub mod probe;
pub mod purge;
pub mod version;

pub use config::{
    load_config, validate_config, Config, ConfigError, Target, MAX_PURGE_INTERVAL,
};
pub use probe::{probe, PathKind, Probe};
pub use purge::{FadvisePurger, PurgeEngine, PurgeError, PurgeStats};
pub use version::{print_version, version_string};
