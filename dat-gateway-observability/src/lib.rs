pub mod access_log;
pub mod init;

pub use access_log::{log_access, AccessLogEntry};
pub use init::init_tracing;
