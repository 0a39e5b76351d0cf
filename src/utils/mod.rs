//! Utility modules for Honeycomb

pub mod logging;
pub mod pidfile;

pub use pidfile::{read_status, PidFileGuard, ServiceStatus};
