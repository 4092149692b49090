//! Filesystem-level operations a backend implements.
//!
//! This module provides the [`Vfs`] trait: a named, versioned provider that
//! opens files and answers path, randomness and clock questions. Engines
//! never call a `Vfs` directly; they go through the
//! [`Provider`](crate::Provider) facade, which applies the open-flag mask,
//! allocation-failure probing and the clock fallback.
//!
//! # Versions
//!
//! | Version | Adds |
//! |---------|------|
//! | 1 | everything required by this trait |
//! | 2+ | `current_time_ms` (when [`VfsCapability::CurrentTimeMs`] is supported) |
//!
//! A version number alone never implies a capability; the facade checks
//! [`Vfs::supports`] as well.
//!
//! # Thread Safety
//!
//! `Vfs` requires `Send + Sync`. One provider serves every thread in the
//! process, so backends use interior mutability internally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{AccessCheck, DlHandle, DlSymbol, OpenFlags, VfsCapability, VfsError, VfsFile};

/// A pluggable storage backend.
///
/// # Example
///
/// ```rust
/// use anyvfs::{AccessCheck, OpenFlags, Vfs, VfsError, VfsFile};
/// use std::path::{Path, PathBuf};
/// use std::time::Duration;
///
/// /// A provider that cannot open anything.
/// struct Refusing;
///
/// impl Vfs for Refusing {
///     fn name(&self) -> &str { "refusing" }
///     fn file_state_size(&self) -> usize { 0 }
///     fn max_pathname(&self) -> usize { 512 }
///     fn open(
///         &self,
///         path: Option<&Path>,
///         _: OpenFlags,
///     ) -> Result<(Box<dyn VfsFile>, OpenFlags), VfsError> {
///         Err(VfsError::CantOpen { path: path.map(Path::to_path_buf).unwrap_or_default() })
///     }
///     fn delete(&self, _: &Path, _: bool) -> Result<(), VfsError> { Ok(()) }
///     fn access(&self, _: &Path, _: AccessCheck) -> Result<bool, VfsError> { Ok(false) }
///     fn full_pathname(&self, path: &Path, out: &mut PathBuf) -> Result<(), VfsError> {
///         out.push(path);
///         Ok(())
///     }
///     fn randomness(&self, buf: &mut [u8]) -> usize { buf.fill(4); buf.len() }
///     fn sleep(&self, duration: Duration) -> Duration { duration }
///     fn current_time(&self) -> Result<f64, VfsError> { Ok(2451545.0) }
/// }
///
/// assert_eq!(Refusing.version(), 1);
/// ```
pub trait Vfs: Send + Sync {
    /// Unique name used for registry lookup.
    fn name(&self) -> &str;

    /// Structure version of this provider (1 or higher).
    fn version(&self) -> u32 {
        1
    }

    /// Bytes of per-file state an open file of this provider needs.
    fn file_state_size(&self) -> usize;

    /// Longest full pathname this provider produces.
    fn max_pathname(&self) -> usize;

    /// Whether an optional capability is implemented.
    fn supports(&self, capability: VfsCapability) -> bool {
        let _ = capability;
        false
    }

    /// Open `path` (or an anonymous temporary file when `None`).
    ///
    /// Only bits in [`OpenFlags::VFS_MASK`] are ever passed. Returns the open
    /// file and the flags actually used (e.g. `READONLY` after a read-write
    /// open fell back).
    ///
    /// # Errors
    ///
    /// - [`VfsError::CantOpen`] if the file cannot be opened
    /// - [`VfsError::Io`] for device errors
    fn open(
        &self,
        path: Option<&Path>,
        flags: OpenFlags,
    ) -> Result<(Box<dyn VfsFile>, OpenFlags), VfsError>;

    /// Delete `path`; when `sync_dir` is set, also sync the containing
    /// directory.
    fn delete(&self, path: &Path, sync_dir: bool) -> Result<(), VfsError>;

    /// Check whether `path` exists or is accessible as described by `check`.
    fn access(&self, path: &Path, check: AccessCheck) -> Result<bool, VfsError>;

    /// Write the canonical full form of `path` into `out`.
    ///
    /// `out` arrives empty.
    fn full_pathname(&self, path: &Path, out: &mut PathBuf) -> Result<(), VfsError>;

    /// Load the dynamic library at `path`.
    ///
    /// Only meaningful when [`VfsCapability::DynamicLibrary`] is supported.
    fn dl_open(&self, path: &Path) -> Option<DlHandle> {
        let _ = path;
        None
    }

    /// Describe the most recent dynamic-library failure into `out`.
    fn dl_error(&self, out: &mut String) {
        out.push_str("dynamic libraries are not supported");
    }

    /// Resolve `symbol` in a library returned by [`dl_open`](Vfs::dl_open).
    fn dl_sym(&self, handle: DlHandle, symbol: &str) -> Option<DlSymbol> {
        let _ = (handle, symbol);
        None
    }

    /// Unload a library returned by [`dl_open`](Vfs::dl_open).
    fn dl_close(&self, handle: DlHandle) {
        let _ = handle;
    }

    /// Fill `buf` with random bytes; returns how many bytes were written.
    fn randomness(&self, buf: &mut [u8]) -> usize;

    /// Sleep for at least `duration`; returns the time actually slept.
    fn sleep(&self, duration: Duration) -> Duration;

    /// Current time as a fractional Julian day number.
    fn current_time(&self) -> Result<f64, VfsError>;

    /// Current time as milliseconds since the Julian epoch.
    ///
    /// Only called when `version() >= 2` and
    /// [`VfsCapability::CurrentTimeMs`] is supported.
    fn current_time_ms(&self) -> Result<i64, VfsError> {
        Err(VfsError::NotSupported {
            operation: "current_time_ms",
        })
    }
}
