pub mod adapter;
pub mod config;
pub mod files;
#[cfg(test)]
mod memory;
pub mod token;

use std::collections::HashMap;

use driveblob_common::{ErrorKind, Storage, StorageError};

pub use adapter::DriveStorage;
pub use config::DriveConfig;

/// Construct a storage backend by name from a flat option map.
pub fn from_options(
    backend: &str,
    opts: &HashMap<String, String>,
) -> Result<Box<dyn Storage>, StorageError> {
    match backend {
        "drive" => Ok(Box::new(DriveStorage::from_options(opts)?)),
        other => Err(StorageError::new(
            "storage.Dial",
            ErrorKind::Configuration,
            anyhow::anyhow!("unknown storage backend: {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend() {
        let err = from_options("gcs", &HashMap::new()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.op(), "storage.Dial");
    }

    #[test]
    fn test_drive_backend_requires_options() {
        let err = from_options("drive", &HashMap::new()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
