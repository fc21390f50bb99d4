pub mod address;
pub mod config;
pub mod error;
pub mod key;

pub use address::{Address, Resolver};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use key::ArchiveKey;
