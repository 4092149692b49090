//! The provider dispatch facade.
//!
//! [`Provider`] wraps one [`Vfs`] and is what engines call for
//! filesystem-level work. Besides plain forwarding it:
//!
//! - clears open flags outside [`OpenFlags::VFS_MASK`],
//! - guarantees `open` leaves the target handle either open (success) or
//!   closed (failure),
//! - pre-clears the `full_pathname` output,
//! - falls back from the millisecond clock to the Julian-day clock,
//! - consults the allocation-failure probe before operations that may
//!   allocate in some backends.
//!
//! # Example
//!
//! ```rust,ignore
//! let provider = registry.provider(None)?;
//! let (handle, _) = provider.open_boxed(Some(Path::new("main.db")), OpenFlags::READWRITE)?;
//! // ...
//! handle.close_free()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::probe::PROBE_SIZE;
use crate::{
    AccessCheck, AllocProbe, DlHandle, DlSymbol, FileHandle, LockBytes, OpenFlags, OsConfig, Vfs,
    VfsCapability, VfsError,
};

/// Milliseconds in one day; converts Julian-day clocks to millisecond clocks.
pub const MS_PER_DAY: f64 = 86_400_000.0;

const TEMP_NAME_CHARS: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Engine-facing view of one storage backend.
///
/// Cheap to clone; clones share the backend and the probe.
#[derive(Clone)]
pub struct Provider {
    vfs: Arc<dyn Vfs>,
    probe: Option<Arc<dyn AllocProbe>>,
    config: OsConfig,
}

impl Provider {
    /// Wrap `vfs` with default configuration and no probe.
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            vfs,
            probe: None,
            config: OsConfig::default(),
        }
    }

    /// Consult `probe` before operations that may allocate.
    ///
    /// Handles opened through this provider inherit the probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn AllocProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: OsConfig) -> Self {
        self.config = config;
        self
    }

    /// The wrapped backend.
    #[inline]
    pub fn vfs(&self) -> &Arc<dyn Vfs> {
        &self.vfs
    }

    /// Name of the wrapped backend.
    #[inline]
    pub fn name(&self) -> &str {
        self.vfs.name()
    }

    /// Active configuration.
    #[inline]
    pub fn config(&self) -> &OsConfig {
        &self.config
    }

    /// Lock byte layout backends of this provider must use.
    #[inline]
    pub fn lock_bytes(&self) -> LockBytes {
        self.config.lock_bytes()
    }

    fn simulate_alloc(&self, operation: &'static str) -> Result<(), VfsError> {
        match &self.probe {
            Some(probe) if !probe.try_alloc(PROBE_SIZE) => {
                tracing::debug!(vfs = self.name(), operation, "allocation failure injected");
                Err(VfsError::IoNoMem { operation })
            }
            _ => Ok(()),
        }
    }

    /// Open `path` into `handle`.
    ///
    /// `handle` must be closed. Flags outside [`OpenFlags::VFS_MASK`] are
    /// cleared before the backend sees them. On success `handle` is open and
    /// the backend's output flags are returned; on failure `handle` is closed.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Misuse`] if `handle` is already open (it is left untouched)
    /// - [`VfsError::IoNoMem`] if the probe simulates an allocation failure
    /// - whatever the backend's `open` returns
    pub fn open(
        &self,
        path: Option<&Path>,
        flags: OpenFlags,
        handle: &mut FileHandle,
    ) -> Result<OpenFlags, VfsError> {
        if handle.is_open() {
            return Err(VfsError::Misuse { operation: "open" });
        }
        self.simulate_alloc("open")?;
        match self.vfs.open(path, flags.masked()) {
            Ok((file, out_flags)) => {
                handle.attach(file, self.probe.clone());
                tracing::debug!(vfs = self.name(), ?path, flags = flags.bits(), "opened");
                Ok(out_flags)
            }
            Err(err) => {
                debug_assert!(!handle.is_open());
                tracing::debug!(vfs = self.name(), ?path, error = %err, "open failed");
                Err(err)
            }
        }
    }

    /// Allocate a handle and open `path` into it.
    ///
    /// The storage is released again if the open fails. Release a returned
    /// handle with [`FileHandle::close_free`].
    ///
    /// # Errors
    ///
    /// - [`VfsError::NoMem`] if the probe refuses the handle allocation
    /// - any error [`open`](Provider::open) returns
    pub fn open_boxed(
        &self,
        path: Option<&Path>,
        flags: OpenFlags,
    ) -> Result<(Box<FileHandle>, OpenFlags), VfsError> {
        if let Some(probe) = &self.probe {
            let size = self.vfs.file_state_size().max(std::mem::size_of::<FileHandle>());
            if !probe.try_alloc(size) {
                return Err(VfsError::NoMem);
            }
        }
        let mut handle = Box::new(FileHandle::new());
        let out_flags = self.open(path, flags, &mut handle)?;
        Ok((handle, out_flags))
    }

    /// Delete `path`, syncing its directory when `sync_dir` is set.
    pub fn delete(&self, path: &Path, sync_dir: bool) -> Result<(), VfsError> {
        self.simulate_alloc("delete")?;
        self.vfs.delete(path, sync_dir)
    }

    /// Check `path` for existence or accessibility.
    pub fn access(&self, path: &Path, check: AccessCheck) -> Result<bool, VfsError> {
        self.simulate_alloc("access")?;
        self.vfs.access(path, check)
    }

    /// Resolve `path` to its full form in `out`.
    ///
    /// `out` is cleared first, so a backend that fails without writing leaves
    /// it empty.
    pub fn full_pathname(&self, path: &Path, out: &mut PathBuf) -> Result<(), VfsError> {
        self.simulate_alloc("full_pathname")?;
        out.clear();
        self.vfs.full_pathname(path, out)
    }

    /// Load a dynamic library.
    pub fn dl_open(&self, path: &Path) -> Option<DlHandle> {
        self.vfs.dl_open(path)
    }

    /// Message describing the last dynamic-library failure.
    pub fn dl_error(&self) -> String {
        let mut message = String::new();
        self.vfs.dl_error(&mut message);
        message
    }

    /// Resolve a symbol in a loaded library.
    pub fn dl_sym(&self, handle: DlHandle, symbol: &str) -> Option<DlSymbol> {
        self.vfs.dl_sym(handle, symbol)
    }

    /// Unload a library.
    pub fn dl_close(&self, handle: DlHandle) {
        self.vfs.dl_close(handle)
    }

    /// Fill `buf` with random bytes from the backend.
    pub fn randomness(&self, buf: &mut [u8]) -> usize {
        self.vfs.randomness(buf)
    }

    /// Sleep through the backend.
    pub fn sleep(&self, duration: Duration) -> Duration {
        self.vfs.sleep(duration)
    }

    /// Current time in milliseconds since the Julian epoch.
    ///
    /// Uses the backend's millisecond clock when it is version 2 or later and
    /// supports [`VfsCapability::CurrentTimeMs`]; otherwise converts the
    /// Julian-day clock with `(day * 86_400_000.0) as i64`.
    ///
    /// The fallback is exact only to the backend's floating-point precision.
    pub fn current_time_ms(&self) -> Result<i64, VfsError> {
        if self.vfs.version() >= 2 && self.vfs.supports(VfsCapability::CurrentTimeMs) {
            self.vfs.current_time_ms()
        } else {
            let day = self.vfs.current_time()?;
            Ok((day * MS_PER_DAY) as i64)
        }
    }

    /// A fresh temporary file path: the configured prefix followed by 16
    /// random alphanumerics, no extension, inside the temporary directory.
    ///
    /// Backends may fill fewer bytes than asked; the rest is requested again.
    ///
    /// # Errors
    ///
    /// [`VfsError::Backend`] if the backend stops producing random bytes.
    pub fn temp_file_name(&self) -> Result<PathBuf, VfsError> {
        let mut random = [0u8; crate::config::TEMP_NAME_RANDOM_LEN];
        let mut filled = 0;
        while filled < random.len() {
            let n = self.vfs.randomness(&mut random[filled..]);
            if n == 0 {
                return Err(VfsError::Backend(format!(
                    "{}: randomness returned no bytes",
                    self.name()
                )));
            }
            filled += n.min(random.len() - filled);
        }

        let mut name = self.config.temp_file_prefix.clone();
        name.extend(
            random
                .iter()
                .map(|b| TEMP_NAME_CHARS[*b as usize % TEMP_NAME_CHARS.len()] as char),
        );
        Ok(self.config.temp_dir().join(name))
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("version", &self.vfs.version())
            .field("probed", &self.probe.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Run backend start-up code, giving `probe` a chance to fail it first.
///
/// # Errors
///
/// - [`VfsError::NoMem`] if the probe refuses
/// - whatever `init` returns
pub fn os_init<F>(probe: Option<&dyn AllocProbe>, init: F) -> Result<(), VfsError>
where
    F: FnOnce() -> Result<(), VfsError>,
{
    if let Some(probe) = probe {
        if !probe.try_alloc(PROBE_SIZE) {
            return Err(VfsError::NoMem);
        }
    }
    init()
}
