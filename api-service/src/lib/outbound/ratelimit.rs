pub mod memory;
pub mod redis_store;
pub mod selector;

pub use memory::MemoryCounterStore;
pub use redis_store::RedisConnector;
pub use redis_store::RedisCounterStore;
pub use selector::BackendSelector;
pub use selector::BackendState;
pub use selector::SelectedBackend;
