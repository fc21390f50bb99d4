pub mod adapter;
pub mod fs_swarm;

pub use adapter::{Materialized, SwarmAdapter};
pub use fs_swarm::FsSwarm;
