//! Logger setup.
//!
//! Hosts embed this crate into their own process, so logger initialization
//! must be both optional and idempotent: the host may already own a `log`
//! backend, in which case this module is simply never called.

mod init;

pub use init::{init_logging, LoggingConfig};
