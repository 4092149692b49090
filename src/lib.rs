//! # anyvfs
//!
//! The dispatch layer between a storage engine and its pluggable storage
//! backends.
//!
//! A backend implements two traits: [`Vfs`] for filesystem-level work and
//! [`VfsFile`] for one open file. The engine never calls them directly; it
//! goes through two facades that add uniform checks and fallbacks, and it
//! finds backends by name in a [`Registry`].
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use anyvfs::{FileHandle, LockLevel, OpenFlags, Registry};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! registry.register(Arc::new(MyVfs::new()), true);
//!
//! let provider = registry.provider(None)?;
//! let mut db = FileHandle::new();
//! provider.open(
//!     Some(Path::new("main.db")),
//!     OpenFlags::READWRITE | OpenFlags::CREATE | OpenFlags::MAIN_DB,
//!     &mut db,
//! )?;
//!
//! db.lock(LockLevel::Shared)?;
//! let mut header = [0u8; 100];
//! db.read(&mut header, 0)?;
//! db.unlock(LockLevel::None)?;
//! db.close()?;
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Vfs`] | Backend trait for open, delete, access, paths, randomness, sleep, clock |
//! | [`VfsFile`] | Backend trait for one open file: I/O, sync, locks, shared memory |
//! | [`FileHandle`] | Engine-facing file facade; closed or open |
//! | [`Provider`] | Engine-facing backend facade |
//! | [`Registry`] | Ordered, thread-safe set of named backends; first is default |
//! | [`LockLevel`] | The five-level file lock and its legal transitions |
//! | [`LockBytes`] | Byte ranges that realise lock levels on a shared file |
//! | [`VfsError`] | Error type shared by facades and backends |
//!
//! ---
//!
//! ## What the Facades Add
//!
//! **[`Provider`]**
//! - Clears open flags outside [`OpenFlags::VFS_MASK`] before the backend sees them
//! - Leaves the target handle open on success and closed on failure
//! - Clears the `full_pathname` output before the backend writes it
//! - Falls back from the millisecond clock to the Julian-day clock
//!
//! **[`FileHandle`]**
//! - Reports the default sector size when the backend has none
//! - Turns advisory file-control hints into fire-and-forget calls
//! - Closes at most once, and on drop
//!
//! Both consult an optional [`AllocProbe`] before operations that may
//! allocate, so tests can inject out-of-memory failures without touching
//! the backend.
//!
//! ---
//!
//! ## Lock Levels
//!
//! ```text
//! None ──▶ Shared ──▶ Reserved ──▶ Exclusive
//!             │                       ▲
//!             └────── (Pending) ──────┘
//! ```
//!
//! `Pending` is never requested directly; it is the transient state on the
//! way to `Exclusive`. Unlock only ever goes to `Shared` or `None`.
//!
//! ---
//!
//! ## Thread Safety
//!
//! [`Vfs`] requires `Send + Sync` and takes `&self`: one backend value serves
//! every thread. [`VfsFile`] requires only `Send`; a [`FileHandle`] is used by
//! one thread at a time. The [`Registry`] serialises its own operations.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for flag sets, [`LockLevel`] and [`OsConfig`]; `OsConfig::from_json` |

// Private modules
mod config;
mod error;
mod handle;
mod lock;
mod probe;
mod provider;
mod registry;
mod traits;
mod types;

// Public re-exports - error types
pub use error::VfsError;

// Public re-exports - core types
pub use types::{
    AccessCheck, DEFAULT_SECTOR_SIZE, DeviceCharacteristics, DlHandle, DlSymbol, FileCapability,
    FileControl, OpenFlags, SHM_NLOCK, ShmLockFlags, SyncFlags, VfsCapability,
};

// Public re-exports - locking
pub use lock::{DEFAULT_PENDING_BYTE, LockBytes, LockLevel, MAX_PENDING_BYTE, SHARED_SIZE};

// Public re-exports - backend traits
pub use traits::{ShmRegion, Vfs, VfsFile};

// Public re-exports - facades and registry
pub use handle::FileHandle;
pub use provider::{MS_PER_DAY, Provider, os_init};
pub use registry::Registry;

// Public re-exports - configuration and testing hooks
pub use config::{DEFAULT_TEMP_FILE_PREFIX, OsConfig, TEMP_NAME_RANDOM_LEN};
pub use probe::{AllocProbe, FailAfter, PROBE_SIZE};
