pub mod drive;
pub mod http_adapter;

pub use drive::{DriveError, DriveStat, FsDrive};
pub use http_adapter::serve;
