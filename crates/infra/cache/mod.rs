pub mod keys;
pub mod memory_cache;
pub mod typed;
