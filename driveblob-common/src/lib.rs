pub mod backend;
pub mod cache;
pub mod error;

pub use backend::Storage;
pub use cache::BoundedCache;
pub use error::{ErrorKind, StorageError};
