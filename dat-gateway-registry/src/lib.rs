pub mod live_archive;
pub mod registry;

pub use live_archive::LiveArchive;
pub use registry::Registry;
