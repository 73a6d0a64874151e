//! Identity persistence implementations.

pub mod file;
pub mod memory;

pub use file::{ClientProfile, FileIdentityStore};
pub use memory::MemoryIdentityStore;
