//! Settings shared by every process touching the same storage objects.
//!
//! These values are part of the on-disk contract: every process sharing a file
//! must use the same lock-byte anchor, and backends recognise engine-owned
//! temporary files by their prefix. The defaults are what every build uses
//! unless a compatibility test overrides them.
//!
//! With the `serde` feature enabled, [`OsConfig`] can be loaded from JSON:
//!
//! ```toml
//! [dependencies]
//! anyvfs = { version = "0.1", features = ["serde"] }
//! ```

use std::path::PathBuf;

use crate::lock::DEFAULT_PENDING_BYTE;
use crate::{LockBytes, VfsError};

/// Prefix of every temporary file name the engine creates.
pub const DEFAULT_TEMP_FILE_PREFIX: &str = "etilqs_";

/// Number of random characters following the prefix in a temporary file name.
pub const TEMP_NAME_RANDOM_LEN: usize = 16;

/// Process-level configuration of the dispatch layer.
///
/// # Example
///
/// ```rust
/// use anyvfs::OsConfig;
///
/// let config = OsConfig::default()
///     .with_pending_byte(0x1_0000)?
///     .with_temp_file_prefix("test_");
/// assert_eq!(config.lock_bytes().reserved_byte(), 0x1_0001);
/// assert_eq!(config.temp_file_prefix, "test_");
///
/// assert!(OsConfig::default().with_pending_byte(u64::MAX).is_err());
/// # Ok::<(), anyvfs::VfsError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OsConfig {
    #[cfg_attr(
        feature = "serde",
        serde(deserialize_with = "deserialize_pending_byte")
    )]
    pending_byte: u64,
    /// Prefix of temporary file names.
    pub temp_file_prefix: String,
    /// Directory for temporary files; the platform default when `None`.
    pub temp_dir: Option<PathBuf>,
}

impl OsConfig {
    /// Override the pending lock byte.
    ///
    /// # Errors
    ///
    /// [`VfsError::Config`] if the lock bytes would run past `u64::MAX`.
    pub fn with_pending_byte(mut self, pending_byte: u64) -> Result<Self, VfsError> {
        self.pending_byte = LockBytes::new(pending_byte)?.pending_byte();
        Ok(self)
    }

    /// Offset of the pending lock byte.
    #[inline]
    pub fn pending_byte(&self) -> u64 {
        self.pending_byte
    }

    /// Override the temporary file prefix.
    #[must_use]
    pub fn with_temp_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_file_prefix = prefix.into();
        self
    }

    /// Place temporary files in `dir`.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Lock byte layout for this configuration.
    pub fn lock_bytes(&self) -> LockBytes {
        LockBytes::anchored(self.pending_byte)
    }

    /// Directory temporary files go to.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Parse a configuration from JSON; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// [`VfsError::Config`] if the JSON is malformed or the pending byte is
    /// out of range.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, VfsError> {
        serde_json::from_str(json).map_err(|e| VfsError::Config(e.to_string()))
    }
}

#[cfg(feature = "serde")]
fn deserialize_pending_byte<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let pending_byte = <u64 as serde::Deserialize>::deserialize(deserializer)?;
    LockBytes::new(pending_byte)
        .map(|bytes| bytes.pending_byte())
        .map_err(serde::de::Error::custom)
}

impl Default for OsConfig {
    fn default() -> Self {
        Self {
            pending_byte: DEFAULT_PENDING_BYTE,
            temp_file_prefix: DEFAULT_TEMP_FILE_PREFIX.to_owned(),
            temp_dir: None,
        }
    }
}
