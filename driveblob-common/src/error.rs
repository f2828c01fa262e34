use std::fmt;

/// Classification of a storage failure.
///
/// Callers branch on the kind, never on the message: `NotExist` is what makes
/// delete idempotent and lets existence checks tell a missing blob apart from
/// a broken link to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed construction options.
    Configuration,
    /// The ref has no corresponding remote object.
    NotExist,
    /// Transport, backend service, or serialization failure.
    Io,
    /// The backend does not offer the requested capability.
    NotSupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::NotExist => "item does not exist",
            ErrorKind::Io => "I/O error",
            ErrorKind::NotSupported => "not supported",
        };
        f.write_str(s)
    }
}

/// Error returned by every [`Storage`](crate::Storage) operation, tagged with
/// the operation that failed and its kind.
#[derive(Debug, thiserror::Error)]
#[error("{op}: {kind}: {source:#}")]
pub struct StorageError {
    op: &'static str,
    kind: ErrorKind,
    #[source]
    source: anyhow::Error,
}

impl StorageError {
    pub fn new(op: &'static str, kind: ErrorKind, source: impl Into<anyhow::Error>) -> Self {
        Self {
            op,
            kind,
            source: source.into(),
        }
    }

    pub fn io(op: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::new(op, ErrorKind::Io, source)
    }

    pub fn not_exist(op: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::new(op, ErrorKind::NotExist, source)
    }

    pub fn not_supported(op: &'static str) -> Self {
        Self::new(
            op,
            ErrorKind::NotSupported,
            anyhow::anyhow!("operation not supported by this backend"),
        )
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_not_exist(&self) -> bool {
        self.kind == ErrorKind::NotExist
    }
}
