//! Per-file operations a backend implements.
//!
//! This module provides the [`VfsFile`] trait, the capability table every
//! open file carries. A [`FileHandle`](crate::FileHandle) owns one boxed
//! `VfsFile` and forwards each call to it without consulting the registry.
//!
//! # Versioned Capabilities
//!
//! Version 1 backends implement the required methods only. Optional
//! capabilities are advertised through [`VfsFile::supports`]:
//!
//! | Capability | Methods | Fallback when absent |
//! |------------|---------|----------------------|
//! | [`FileCapability::SectorSize`] | `sector_size` | [`DEFAULT_SECTOR_SIZE`] |
//! | [`FileCapability::SharedMemory`] | `shm_map`, `shm_lock`, `shm_barrier`, `shm_unmap` | `NotSupported` error |
//!
//! # Example
//!
//! ```rust
//! use anyvfs::{
//!     DeviceCharacteristics, FileControl, LockLevel, SyncFlags, VfsError, VfsFile,
//! };
//!
//! /// A file that is always empty and never locks.
//! struct NullFile;
//!
//! impl VfsFile for NullFile {
//!     fn close(&mut self) -> Result<(), VfsError> { Ok(()) }
//!     fn read(&mut self, buf: &mut [u8], _: u64) -> Result<(), VfsError> {
//!         buf.fill(0);
//!         Err(VfsError::ShortRead { requested: buf.len(), read: 0 })
//!     }
//!     fn write(&mut self, _: &[u8], _: u64) -> Result<(), VfsError> { Ok(()) }
//!     fn truncate(&mut self, _: u64) -> Result<(), VfsError> { Ok(()) }
//!     fn sync(&mut self, _: SyncFlags) -> Result<(), VfsError> { Ok(()) }
//!     fn file_size(&self) -> Result<u64, VfsError> { Ok(0) }
//!     fn lock(&mut self, _: LockLevel) -> Result<(), VfsError> { Ok(()) }
//!     fn unlock(&mut self, _: LockLevel) -> Result<(), VfsError> { Ok(()) }
//!     fn check_reserved_lock(&mut self) -> Result<bool, VfsError> { Ok(false) }
//!     fn file_control(&mut self, _: FileControl<'_>) -> Result<(), VfsError> {
//!         Err(VfsError::NotSupported { operation: "file_control" })
//!     }
//!     fn device_characteristics(&self) -> DeviceCharacteristics {
//!         DeviceCharacteristics::NONE
//!     }
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::AtomicU8;

use crate::{
    DEFAULT_SECTOR_SIZE, DeviceCharacteristics, FileCapability, FileControl, LockLevel,
    ShmLockFlags, SyncFlags, VfsError,
};

/// A mapped region of the shared-memory index.
///
/// Regions are shared between every connection to the same file, so the bytes
/// are atomics. Cloning a region clones the mapping, not the memory.
#[derive(Debug, Clone)]
pub struct ShmRegion(Arc<[AtomicU8]>);

impl ShmRegion {
    /// A fresh zero-filled region of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self((0..len).map(|_| AtomicU8::new(0)).collect())
    }

    /// Length of the region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a zero-length region.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The region's bytes.
    #[inline]
    pub fn bytes(&self) -> &[AtomicU8] {
        &self.0
    }

    /// Returns `true` if both values map the same memory.
    #[inline]
    pub fn same_region(&self, other: &ShmRegion) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Operations on one open file, implemented by a backend.
///
/// Every method receives its arguments exactly as the engine passed them;
/// constraint checking (offset ranges, lock protocol, ...) is the backend's
/// job. The lock methods must honour the holder rules of [`LockLevel`].
///
/// `VfsFile` is `Send` so a handle may move between threads, but a single
/// handle is only ever used by one thread at a time.
pub trait VfsFile: Send {
    /// Release backend resources for this file.
    ///
    /// Called at most once. The object is dropped right after, whatever the
    /// result.
    fn close(&mut self) -> Result<(), VfsError>;

    /// Fill `buf` with bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::ShortRead`] if the file ends early; the unread tail of
    ///   `buf` must be zero-filled
    /// - [`VfsError::Io`] for device errors
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<(), VfsError>;

    /// Write all of `data` at `offset`, growing the file if needed.
    fn write(&mut self, data: &[u8], offset: u64) -> Result<(), VfsError>;

    /// Shrink (or grow) the file to exactly `size` bytes.
    fn truncate(&mut self, size: u64) -> Result<(), VfsError>;

    /// Flush written data to durable storage.
    fn sync(&mut self, flags: SyncFlags) -> Result<(), VfsError>;

    /// Current size of the file in bytes.
    fn file_size(&self) -> Result<u64, VfsError>;

    /// Raise the lock held through this file to `level`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Busy`] if another holder conflicts
    /// - [`VfsError::Misuse`] if the request breaks the lock protocol
    fn lock(&mut self, level: LockLevel) -> Result<(), VfsError>;

    /// Lower the lock held through this file to `level` (`None` or `Shared`).
    fn unlock(&mut self, level: LockLevel) -> Result<(), VfsError>;

    /// Returns `true` if any holder (this one included) holds `Reserved` or
    /// higher on the underlying object.
    fn check_reserved_lock(&mut self) -> Result<bool, VfsError>;

    /// Answer a file-control request.
    ///
    /// Requests the backend does not understand must fail with
    /// [`VfsError::NotSupported`].
    fn file_control(&mut self, op: FileControl<'_>) -> Result<(), VfsError>;

    /// Properties of the device holding this file.
    fn device_characteristics(&self) -> DeviceCharacteristics;

    /// Whether an optional capability is implemented.
    fn supports(&self, capability: FileCapability) -> bool {
        let _ = capability;
        false
    }

    /// Smallest unit the device writes atomically.
    ///
    /// Only called when [`FileCapability::SectorSize`] is supported.
    fn sector_size(&self) -> u32 {
        DEFAULT_SECTOR_SIZE
    }

    /// Map region `region` (each `region_size` bytes) of the shared-memory index.
    ///
    /// Returns `Ok(None)` if the region does not exist and `extend` is false.
    fn shm_map(
        &mut self,
        region: u32,
        region_size: u32,
        extend: bool,
    ) -> Result<Option<ShmRegion>, VfsError> {
        let _ = (region, region_size, extend);
        Err(VfsError::NotSupported {
            operation: "shm_map",
        })
    }

    /// Take or release `n` shared-memory lock slots starting at `offset`.
    fn shm_lock(&mut self, offset: u32, n: u32, flags: ShmLockFlags) -> Result<(), VfsError> {
        let _ = (offset, n, flags);
        Err(VfsError::NotSupported {
            operation: "shm_lock",
        })
    }

    /// Memory barrier between shared-memory accesses.
    fn shm_barrier(&mut self) {
        std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
    }

    /// Drop this file's mapping; delete the backing storage if `delete`.
    fn shm_unmap(&mut self, delete: bool) -> Result<(), VfsError> {
        let _ = delete;
        Err(VfsError::NotSupported {
            operation: "shm_unmap",
        })
    }

    /// Returns `true` for purely in-memory files (e.g. in-memory journals).
    ///
    /// Such files never allocate through the backend, so simulated allocation
    /// failures skip them.
    fn is_in_memory(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    /// Version 1 file: required methods only.
    struct PlainFile {
        data: Vec<u8>,
        level: LockLevel,
    }

    impl VfsFile for PlainFile {
        fn close(&mut self) -> Result<(), VfsError> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<(), VfsError> {
            let start = (offset as usize).min(self.data.len());
            let available = &self.data[start..];
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            if n < buf.len() {
                buf[n..].fill(0);
                return Err(VfsError::ShortRead {
                    requested: buf.len(),
                    read: n,
                });
            }
            Ok(())
        }

        fn write(&mut self, data: &[u8], offset: u64) -> Result<(), VfsError> {
            let end = offset as usize + data.len();
            if self.data.len() < end {
                self.data.resize(end, 0);
            }
            self.data[offset as usize..end].copy_from_slice(data);
            Ok(())
        }

        fn truncate(&mut self, size: u64) -> Result<(), VfsError> {
            self.data.resize(size as usize, 0);
            Ok(())
        }

        fn sync(&mut self, _: SyncFlags) -> Result<(), VfsError> {
            Ok(())
        }

        fn file_size(&self) -> Result<u64, VfsError> {
            Ok(self.data.len() as u64)
        }

        fn lock(&mut self, level: LockLevel) -> Result<(), VfsError> {
            if self.level.check_lock(level)? {
                self.level = level;
            }
            Ok(())
        }

        fn unlock(&mut self, level: LockLevel) -> Result<(), VfsError> {
            if self.level.check_unlock(level)? {
                self.level = level;
            }
            Ok(())
        }

        fn check_reserved_lock(&mut self) -> Result<bool, VfsError> {
            Ok(self.level >= LockLevel::Reserved)
        }

        fn file_control(&mut self, op: FileControl<'_>) -> Result<(), VfsError> {
            match op {
                FileControl::LockState(out) => {
                    *out = self.level;
                    Ok(())
                }
                _ => Err(VfsError::NotSupported {
                    operation: "file_control",
                }),
            }
        }

        fn device_characteristics(&self) -> DeviceCharacteristics {
            DeviceCharacteristics::SAFE_APPEND
        }
    }

    fn plain() -> PlainFile {
        PlainFile {
            data: Vec::new(),
            level: LockLevel::None,
        }
    }

    #[test]
    fn optional_capabilities_default_to_absent() {
        let file = plain();
        assert!(!file.supports(FileCapability::SectorSize));
        assert!(!file.supports(FileCapability::SharedMemory));
        assert!(!file.is_in_memory());
    }

    #[test]
    fn shm_defaults_report_not_supported() {
        let mut file = plain();
        assert!(matches!(
            file.shm_map(0, 32768, true),
            Err(VfsError::NotSupported { .. })
        ));
        assert!(matches!(
            file.shm_lock(0, 1, ShmLockFlags::LOCK | ShmLockFlags::SHARED),
            Err(VfsError::NotSupported { .. })
        ));
        assert!(matches!(
            file.shm_unmap(false),
            Err(VfsError::NotSupported { .. })
        ));
        file.shm_barrier();
    }

    #[test]
    fn short_read_zero_fills() {
        let mut file = plain();
        file.write(b"abc", 0).unwrap();
        let mut buf = [0xffu8; 5];
        let result = file.read(&mut buf, 1);
        assert!(matches!(
            result,
            Err(VfsError::ShortRead {
                requested: 5,
                read: 2
            })
        ));
        assert_eq!(&buf, b"bc\0\0\0");
    }

    #[test]
    fn lock_state_file_control() {
        let mut file = plain();
        file.lock(LockLevel::Shared).unwrap();
        let mut level = LockLevel::None;
        file.file_control(FileControl::LockState(&mut level)).unwrap();
        assert_eq!(level, LockLevel::Shared);
    }

    #[test]
    fn file_is_object_safe() {
        let mut file: Box<dyn VfsFile> = Box::new(plain());
        file.write(b"page", 0).unwrap();
        assert_eq!(file.file_size().unwrap(), 4);
    }

    #[test]
    fn shm_region_is_shared_between_clones() {
        let region = ShmRegion::zeroed(16);
        let clone = region.clone();
        region.bytes()[3].store(42, Ordering::SeqCst);
        assert_eq!(clone.bytes()[3].load(Ordering::SeqCst), 42);
        assert!(region.same_region(&clone));
        assert!(!region.same_region(&ShmRegion::zeroed(16)));
        assert_eq!(region.len(), 16);
        assert!(!region.is_empty());
    }
}
