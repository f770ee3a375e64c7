pub mod entry;
pub mod expiry;
pub mod storage;

pub use entry::StoredResponse;
pub use expiry::EXPIRES_HEADER;
pub use storage::{CacheStorage, TileStore};
