//! Error types for the anyvfs dispatch layer.

use std::path::PathBuf;

/// Error type shared by the facades, the registry and every backend.
///
/// Backends report failures through the same type the engine receives, so the
/// dispatch layer can pass them through untouched. Uses `#[non_exhaustive]`
/// for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use anyvfs::VfsError;
///
/// let err = VfsError::NotFound { name: "memdb".into() };
/// assert_eq!(err.to_string(), "vfs not found: memdb");
///
/// // Allocation failure during I/O is distinct from a device error.
/// let err = VfsError::IoNoMem { operation: "read" };
/// assert!(err.is_out_of_memory());
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    // I/O errors
    /// Generic I/O failure reported by a backend.
    #[error("{operation} failed: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A read returned fewer bytes than requested.
    ///
    /// Backends zero-fill the unread tail of the buffer before reporting this.
    #[error("short read: {read} of {requested} bytes")]
    ShortRead {
        /// Bytes the caller asked for.
        requested: usize,
        /// Bytes actually read.
        read: usize,
    },

    /// An allocation failed while performing I/O.
    #[error("{operation}: out of memory during I/O")]
    IoNoMem {
        /// The operation that was short-circuited.
        operation: &'static str,
    },

    // Resource errors
    /// An allocation failed outside of an I/O operation.
    #[error("out of memory")]
    NoMem,

    /// The backend could not open the requested file.
    #[error("unable to open: {path}")]
    CantOpen {
        /// The path that could not be opened.
        path: PathBuf,
    },

    /// A lock could not be obtained because another holder conflicts.
    #[error("{operation}: busy")]
    Busy {
        /// The locking operation that was refused.
        operation: &'static str,
    },

    // Lookup errors
    /// No provider is registered under the requested name.
    #[error("vfs not found: {name}")]
    NotFound {
        /// The name that was looked up (empty for "the default").
        name: String,
    },

    // Protocol errors
    /// The caller broke the calling protocol (e.g. used a closed handle).
    #[error("{operation}: misuse")]
    Misuse {
        /// The operation that was misused.
        operation: &'static str,
    },

    /// The backend does not provide an optional capability.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Backend specific error.
    #[error("backend error: {0}")]
    Backend(String),
}

impl VfsError {
    /// Returns `true` for either out-of-memory kind.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, VfsError::NoMem | VfsError::IoNoMem { .. })
    }
}

impl From<std::io::Error> for VfsError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::OutOfMemory => VfsError::IoNoMem { operation: "io" },
            _ => VfsError::Io {
                operation: "io",
                source: error,
            },
        }
    }
}
