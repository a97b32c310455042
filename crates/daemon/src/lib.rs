//! cachectld: runs one purge loop per configured target until a termination signal arrives.

pub mod lifecycle;
pub mod orchestrator;
pub mod scheduler;

pub const NAME: &str = "cachectld";
