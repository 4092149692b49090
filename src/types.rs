//! Flag sets, codes and opaque tokens passed across the backend boundary.

use std::any::Any;
use std::ops::{BitOr, BitOrAssign};

use crate::LockLevel;

/// Sector size reported for files whose backend does not supply one.
pub const DEFAULT_SECTOR_SIZE: u32 = 4096;

/// Number of shared-memory lock slots a backend must provide.
pub const SHM_NLOCK: u32 = 8;

macro_rules! flag_set {
    ($name:ident) => {
        impl $name {
            /// The empty set.
            pub const NONE: Self = Self(0);

            /// Build a set from raw bits.
            #[inline]
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            /// Raw bit value.
            #[inline]
            pub const fn bits(&self) -> u32 {
                self.0
            }

            /// Returns `true` if every bit of `other` is set in `self`.
            #[inline]
            pub const fn contains(&self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            /// Returns `true` if no bit is set.
            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.0 == 0
            }

            /// Union of two sets.
            #[inline]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Set with the bits of `other` cleared.
            #[inline]
            pub const fn difference(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

/// Flags for opening a file through a provider.
///
/// The bit values are a stable contract with backends. Only the bits in
/// [`OpenFlags::VFS_MASK`] ever reach a backend; the rest (mutex and cache
/// modes, in-memory requests) are engine-level concerns and are cleared by
/// [`Provider::open`](crate::Provider::open).
///
/// # Example
///
/// ```rust
/// use anyvfs::OpenFlags;
///
/// let flags = OpenFlags::READWRITE | OpenFlags::CREATE | OpenFlags::FULLMUTEX;
/// let forwarded = flags.masked();
/// assert!(forwarded.contains(OpenFlags::READWRITE | OpenFlags::CREATE));
/// assert!(!forwarded.contains(OpenFlags::FULLMUTEX));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenFlags(u32);

flag_set!(OpenFlags);

impl OpenFlags {
    /// Open read-only.
    pub const READONLY: Self = Self(0x0000_0001);
    /// Open for reading and writing.
    pub const READWRITE: Self = Self(0x0000_0002);
    /// Create the file if it does not exist.
    pub const CREATE: Self = Self(0x0000_0004);
    /// Delete the file when it is closed.
    pub const DELETEONCLOSE: Self = Self(0x0000_0008);
    /// Fail if the file already exists (with `CREATE`).
    pub const EXCLUSIVE: Self = Self(0x0000_0010);
    /// Let the backend pick a proxy locking style.
    pub const AUTOPROXY: Self = Self(0x0000_0020);
    /// The path is a URI.
    pub const URI: Self = Self(0x0000_0040);
    /// In-memory database request; handled above the backend.
    pub const MEMORY: Self = Self(0x0000_0080);
    /// Main database file.
    pub const MAIN_DB: Self = Self(0x0000_0100);
    /// Temporary database file.
    pub const TEMP_DB: Self = Self(0x0000_0200);
    /// Transient database file.
    pub const TRANSIENT_DB: Self = Self(0x0000_0400);
    /// Rollback journal of the main database.
    pub const MAIN_JOURNAL: Self = Self(0x0000_0800);
    /// Rollback journal of a temporary database.
    pub const TEMP_JOURNAL: Self = Self(0x0000_1000);
    /// Statement sub-journal.
    pub const SUBJOURNAL: Self = Self(0x0000_2000);
    /// Master journal for multi-file commits.
    pub const MASTER_JOURNAL: Self = Self(0x0000_4000);
    /// No per-connection mutex; handled above the backend.
    pub const NOMUTEX: Self = Self(0x0000_8000);
    /// Serialized connection mutex; handled above the backend.
    pub const FULLMUTEX: Self = Self(0x0001_0000);
    /// Shared page cache; handled above the backend.
    pub const SHAREDCACHE: Self = Self(0x0002_0000);
    /// Private page cache; handled above the backend.
    pub const PRIVATECACHE: Self = Self(0x0004_0000);
    /// Write-ahead log file.
    pub const WAL: Self = Self(0x0008_0000);

    /// The only open-flag bits a backend ever sees.
    pub const VFS_MASK: Self = Self(0x0008_7f7f);

    /// This set restricted to [`OpenFlags::VFS_MASK`].
    #[inline]
    pub const fn masked(self) -> Self {
        Self(self.0 & Self::VFS_MASK.0)
    }
}

/// Flags passed to `sync`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncFlags(u32);

flag_set!(SyncFlags);

impl SyncFlags {
    /// Ordinary fsync.
    pub const NORMAL: Self = Self(0x0000_0002);
    /// Full flush to the storage medium where the platform distinguishes it.
    pub const FULL: Self = Self(0x0000_0003);
    /// Only file data needs to reach the medium, not metadata.
    pub const DATAONLY: Self = Self(0x0000_0010);
}

/// Device characteristics a backend advertises for an open file.
///
/// Engines use these to skip journal work the device makes unnecessary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceCharacteristics(u32);

flag_set!(DeviceCharacteristics);

impl DeviceCharacteristics {
    /// Every write of any size is atomic.
    pub const ATOMIC: Self = Self(0x0000_0001);
    /// 512-byte aligned writes are atomic.
    pub const ATOMIC512: Self = Self(0x0000_0002);
    /// 1 KiB aligned writes are atomic.
    pub const ATOMIC1K: Self = Self(0x0000_0004);
    /// 2 KiB aligned writes are atomic.
    pub const ATOMIC2K: Self = Self(0x0000_0008);
    /// 4 KiB aligned writes are atomic.
    pub const ATOMIC4K: Self = Self(0x0000_0010);
    /// 8 KiB aligned writes are atomic.
    pub const ATOMIC8K: Self = Self(0x0000_0020);
    /// 16 KiB aligned writes are atomic.
    pub const ATOMIC16K: Self = Self(0x0000_0040);
    /// 32 KiB aligned writes are atomic.
    pub const ATOMIC32K: Self = Self(0x0000_0080);
    /// 64 KiB aligned writes are atomic.
    pub const ATOMIC64K: Self = Self(0x0000_0100);
    /// Appends happen before the file size grows.
    pub const SAFE_APPEND: Self = Self(0x0000_0200);
    /// Writes reach the medium in the order issued.
    pub const SEQUENTIAL: Self = Self(0x0000_0400);
    /// The file cannot be deleted while it is open.
    pub const UNDELETABLE_WHEN_OPEN: Self = Self(0x0000_0800);
    /// Writing one byte never damages neighbouring bytes on power loss.
    pub const POWERSAFE_OVERWRITE: Self = Self(0x0000_1000);
}

/// Flags passed to `shm_lock`.
///
/// Exactly one of `LOCK`/`UNLOCK` combined with exactly one of
/// `SHARED`/`EXCLUSIVE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShmLockFlags(u32);

flag_set!(ShmLockFlags);

impl ShmLockFlags {
    /// Release the slots.
    pub const UNLOCK: Self = Self(1);
    /// Acquire the slots.
    pub const LOCK: Self = Self(2);
    /// Shared mode.
    pub const SHARED: Self = Self(4);
    /// Exclusive mode.
    pub const EXCLUSIVE: Self = Self(8);
}

/// What `access` should check for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessCheck {
    /// The path exists.
    Exists,
    /// The path is readable and writable.
    ReadWrite,
    /// The path is readable.
    Read,
}

impl AccessCheck {
    /// Stable numeric code of this check.
    pub const fn code(self) -> u32 {
        match self {
            AccessCheck::Exists => 0,
            AccessCheck::ReadWrite => 1,
            AccessCheck::Read => 2,
        }
    }
}

/// Optional provider operations, queried with
/// [`Vfs::supports`](crate::Vfs::supports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VfsCapability {
    /// `current_time_ms` (version 2 and later).
    CurrentTimeMs,
    /// `dl_open`, `dl_error`, `dl_sym`, `dl_close`.
    DynamicLibrary,
}

/// Optional file operations, queried with
/// [`VfsFile::supports`](crate::VfsFile::supports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCapability {
    /// `sector_size`.
    SectorSize,
    /// `shm_map`, `shm_lock`, `shm_barrier`, `shm_unmap` (version 2 and later).
    SharedMemory,
}

/// Opaque handle to a dynamic library loaded by a provider.
///
/// The internal value is provider-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DlHandle(pub usize);

/// Opaque address of a symbol resolved from a [`DlHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DlSymbol(pub usize);

/// A file-control request.
///
/// The typed variants cover the requests engines commonly make; anything
/// else travels as [`FileControl::Custom`]. Backends answer requests they do
/// not understand with [`VfsError::NotSupported`](crate::VfsError::NotSupported).
pub enum FileControl<'a> {
    /// Report the lock level currently held through this handle.
    LockState(&'a mut LockLevel),
    /// The file is about to grow to this many bytes.
    SizeHint(u64),
    /// Grow and shrink the file in chunks of this many bytes.
    ChunkSize(u32),
    /// A sync that would normally happen was skipped.
    SyncOmitted,
    /// Fill in the name chain of the providers handling this file.
    VfsName(&'a mut Option<String>),
    /// Sent to a database file before a transaction that did not change it.
    DbUnchanged,
    /// A request outside the typed set.
    Custom {
        /// Request opcode.
        op: u32,
        /// Request argument, if any.
        arg: Option<&'a mut dyn Any>,
    },
}

impl FileControl<'_> {
    /// Stable numeric opcode of this request.
    pub fn opcode(&self) -> u32 {
        match self {
            FileControl::LockState(_) => 1,
            FileControl::SizeHint(_) => 5,
            FileControl::ChunkSize(_) => 6,
            FileControl::SyncOmitted => 8,
            FileControl::VfsName(_) => 12,
            FileControl::DbUnchanged => 0xca09_3fa0,
            FileControl::Custom { op, .. } => *op,
        }
    }
}

impl std::fmt::Debug for FileControl<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileControl::LockState(level) => f.debug_tuple("LockState").field(level).finish(),
            FileControl::SizeHint(size) => f.debug_tuple("SizeHint").field(size).finish(),
            FileControl::ChunkSize(size) => f.debug_tuple("ChunkSize").field(size).finish(),
            FileControl::SyncOmitted => f.write_str("SyncOmitted"),
            FileControl::VfsName(name) => f.debug_tuple("VfsName").field(name).finish(),
            FileControl::DbUnchanged => f.write_str("DbUnchanged"),
            FileControl::Custom { op, arg } => f
                .debug_struct("Custom")
                .field("op", op)
                .field("has_arg", &arg.is_some())
                .finish(),
        }
    }
}
