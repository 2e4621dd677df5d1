pub mod memory;
pub mod moka;
pub mod null;

pub use memory::MemoryObjectCache;
pub use moka::MokaObjectCache;
pub use null::NullObjectCache;
