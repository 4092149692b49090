//! # Backend Traits
//!
//! The downward contract every storage backend implements.
//!
//! ```text
//! Vfs (provider: open, delete, access, paths, randomness, sleep, clock)
//!  └── open() ──▶ Box<dyn VfsFile> (file: read, write, sync, lock, shm, ...)
//! ```
//!
//! | Trait | Implemented by | Held by |
//! |-------|----------------|---------|
//! | [`Vfs`] | one value per backend | [`Registry`](crate::Registry), [`Provider`](crate::Provider) |
//! | [`VfsFile`] | one value per open file | [`FileHandle`](crate::FileHandle) |
//!
//! Optional operations are discovered with `supports(..)` on either trait;
//! every optional method has a default that reports
//! [`VfsError::NotSupported`](crate::VfsError::NotSupported) or does nothing.

mod file;
mod vfs;

pub use file::{ShmRegion, VfsFile};
pub use vfs::Vfs;
