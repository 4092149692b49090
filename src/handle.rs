//! The per-file dispatch facade.
//!
//! A [`FileHandle`] owns the backend file object returned by
//! [`Provider::open`](crate::Provider::open) and forwards every call to it.
//! The facade adds only four local behaviours:
//!
//! 1. a closed handle rejects every operation with [`VfsError::Misuse`]
//!    (close itself is a no-op),
//! 2. `sector_size` falls back to [`DEFAULT_SECTOR_SIZE`],
//! 3. `file_control_hint` discards the backend's answer,
//! 4. operations that may allocate consult the allocation-failure probe.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut handle = FileHandle::new();
//! provider.open(Some(Path::new("main.db")), OpenFlags::READWRITE | OpenFlags::CREATE, &mut handle)?;
//! handle.write(b"header", 0)?;
//! handle.close()?;
//! handle.close()?; // no-op
//! ```

use std::fmt;
use std::sync::Arc;

use crate::probe::PROBE_SIZE;
use crate::{
    AllocProbe, DEFAULT_SECTOR_SIZE, DeviceCharacteristics, FileCapability, FileControl,
    LockLevel, ShmLockFlags, ShmRegion, SyncFlags, VfsError, VfsFile,
};

/// An open (or closed) file.
///
/// Exclusively owned by whoever opened it; every operation takes `&mut self`.
/// Dropping an open handle closes it and discards the close result, so use
/// [`close`](FileHandle::close) when the result matters.
#[derive(Default)]
pub struct FileHandle {
    file: Option<Box<dyn VfsFile>>,
    probe: Option<Arc<dyn AllocProbe>>,
}

impl FileHandle {
    /// A closed handle, ready to be opened into.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while the handle holds a backend file.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Install an opened backend file. Only the provider facade opens.
    pub(crate) fn attach(&mut self, file: Box<dyn VfsFile>, probe: Option<Arc<dyn AllocProbe>>) {
        self.file = Some(file);
        self.probe = probe;
    }

    fn file(&self, operation: &'static str) -> Result<&(dyn VfsFile + 'static), VfsError> {
        self.file.as_deref().ok_or(VfsError::Misuse { operation })
    }

    fn file_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut (dyn VfsFile + 'static), VfsError> {
        match self.file.as_deref_mut() {
            Some(file) => Ok(file),
            None => Err(VfsError::Misuse { operation }),
        }
    }

    /// Like [`file_mut`](Self::file_mut), but first give the probe a chance to
    /// simulate an allocation failure.
    fn probed(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut (dyn VfsFile + 'static), VfsError> {
        let file = match self.file.as_deref_mut() {
            Some(file) => file,
            None => return Err(VfsError::Misuse { operation }),
        };
        if let Some(probe) = &self.probe {
            if !file.is_in_memory() && !probe.try_alloc(PROBE_SIZE) {
                tracing::debug!(operation, "allocation failure injected");
                return Err(VfsError::IoNoMem { operation });
            }
        }
        tracing::trace!(operation, "dispatch");
        Ok(file)
    }

    /// Close the file.
    ///
    /// The handle is closed afterwards even if the backend reported an error,
    /// and closing a closed handle succeeds without doing anything.
    pub fn close(&mut self) -> Result<(), VfsError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        self.probe = None;
        let result = file.close();
        drop(file);
        if let Err(err) = &result {
            tracing::debug!(error = %err, "close reported an error");
        }
        result
    }

    /// Close a handle allocated by
    /// [`Provider::open_boxed`](crate::Provider::open_boxed) and release its
    /// storage.
    ///
    /// The storage is released whatever close returns; the close result is
    /// passed on.
    pub fn close_free(mut self: Box<Self>) -> Result<(), VfsError> {
        let result = self.close();
        if let Err(err) = &result {
            tracing::warn!(error = %err, "releasing handle after failed close");
        }
        drop(self);
        result
    }

    /// Fill `buf` from `offset`.
    pub fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<(), VfsError> {
        self.probed("read")?.read(buf, offset)
    }

    /// Write `data` at `offset`.
    pub fn write(&mut self, data: &[u8], offset: u64) -> Result<(), VfsError> {
        self.probed("write")?.write(data, offset)
    }

    /// Set the file length to `size`.
    pub fn truncate(&mut self, size: u64) -> Result<(), VfsError> {
        self.file_mut("truncate")?.truncate(size)
    }

    /// Flush to durable storage.
    pub fn sync(&mut self, flags: SyncFlags) -> Result<(), VfsError> {
        self.probed("sync")?.sync(flags)
    }

    /// Current file length.
    pub fn file_size(&mut self) -> Result<u64, VfsError> {
        self.probed("file_size")?.file_size()
    }

    /// Raise the lock to `level`.
    pub fn lock(&mut self, level: LockLevel) -> Result<(), VfsError> {
        self.probed("lock")?.lock(level)
    }

    /// Lower the lock to `level`.
    pub fn unlock(&mut self, level: LockLevel) -> Result<(), VfsError> {
        self.file_mut("unlock")?.unlock(level)
    }

    /// Whether anyone holds `Reserved` or higher on the file.
    pub fn check_reserved_lock(&mut self) -> Result<bool, VfsError> {
        self.probed("check_reserved_lock")?.check_reserved_lock()
    }

    /// Send a file-control request whose outcome matters.
    pub fn file_control(&mut self, op: FileControl<'_>) -> Result<(), VfsError> {
        self.probed("file_control")?.file_control(op)
    }

    /// Send an advisory file-control request; the outcome is ignored.
    pub fn file_control_hint(&mut self, op: FileControl<'_>) {
        if let Some(file) = self.file.as_deref_mut() {
            let _ = file.file_control(op);
        }
    }

    /// Atomic write unit of the device, or [`DEFAULT_SECTOR_SIZE`] when the
    /// backend does not say.
    pub fn sector_size(&self) -> Result<u32, VfsError> {
        let file = self.file("sector_size")?;
        Ok(if file.supports(FileCapability::SectorSize) {
            file.sector_size()
        } else {
            DEFAULT_SECTOR_SIZE
        })
    }

    /// Device properties reported by the backend.
    pub fn device_characteristics(&self) -> Result<DeviceCharacteristics, VfsError> {
        Ok(self.file("device_characteristics")?.device_characteristics())
    }

    /// Map a shared-memory region.
    pub fn shm_map(
        &mut self,
        region: u32,
        region_size: u32,
        extend: bool,
    ) -> Result<Option<ShmRegion>, VfsError> {
        let file = self.probed("shm_map")?;
        require_shm(file, "shm_map")?;
        file.shm_map(region, region_size, extend)
    }

    /// Take or release shared-memory lock slots.
    pub fn shm_lock(&mut self, offset: u32, n: u32, flags: ShmLockFlags) -> Result<(), VfsError> {
        let file = self.file_mut("shm_lock")?;
        require_shm(file, "shm_lock")?;
        file.shm_lock(offset, n, flags)
    }

    /// Shared-memory barrier. Does nothing on a closed handle or a backend
    /// without shared memory.
    pub fn shm_barrier(&mut self) {
        if let Some(file) = self.file.as_deref_mut() {
            if file.supports(FileCapability::SharedMemory) {
                file.shm_barrier();
            }
        }
    }

    /// Unmap shared memory, deleting it if `delete`.
    pub fn shm_unmap(&mut self, delete: bool) -> Result<(), VfsError> {
        let file = self.file_mut("shm_unmap")?;
        require_shm(file, "shm_unmap")?;
        file.shm_unmap(delete)
    }
}

fn require_shm(file: &dyn VfsFile, operation: &'static str) -> Result<(), VfsError> {
    if file.supports(FileCapability::SharedMemory) {
        Ok(())
    } else {
        Err(VfsError::NotSupported { operation })
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.is_open() {
            let _ = self.close();
        }
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("open", &self.is_open())
            .field("probed", &self.probe.is_some())
            .finish()
    }
}
