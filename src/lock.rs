//! Advisory lock levels and the byte-range locking convention.
//!
//! # Overview
//!
//! Every backend takes the same five lock levels on a storage object:
//!
//! ```text
//! None < Shared < Reserved < Pending < Exclusive
//! ```
//!
//! - **Shared**: any number of holders may read.
//! - **Reserved**: one holder intends to write; new readers are still allowed.
//! - **Pending**: one holder waits for readers to drain; new readers are refused.
//! - **Exclusive**: one holder writes; nobody else holds anything.
//!
//! `Pending` is never requested directly. A request for `Exclusive` made while
//! holding `Shared` or `Reserved` passes through `Pending` first, so that the
//! existing readers drain while new ones are kept out.
//!
//! # Byte-Range Convention
//!
//! Backends without native multi-level locks emulate the levels with byte-range
//! locks on fixed offsets of the file (see [`LockBytes`]). The offsets must be
//! identical in every process touching the same file; the engine never stores
//! data on the page that holds them.
//!
//! Enforcement lives in the backends. This module provides the shared vocabulary
//! and the request rules ([`LockLevel::check_lock`], [`LockLevel::check_unlock`])
//! that every backend applies the same way.

use std::num::NonZeroU64;
use std::ops::Range;

use crate::VfsError;

/// Default offset of the pending byte (the 1 GiB mark).
pub const DEFAULT_PENDING_BYTE: u64 = 0x4000_0000;

/// Number of bytes in the shared pool.
pub const SHARED_SIZE: u64 = 510;

/// Largest pending byte whose lock bytes still fit below `u64::MAX`.
pub const MAX_PENDING_BYTE: u64 = u64::MAX - 2 - SHARED_SIZE;

/// Advisory lock level held on a storage object.
///
/// Levels are ordered; a holder only ever moves up with `lock` and down with
/// `unlock`.
///
/// # Example
///
/// ```rust
/// use anyvfs::LockLevel;
///
/// assert!(LockLevel::Shared < LockLevel::Exclusive);
/// assert_eq!(LockLevel::try_from(2).unwrap(), LockLevel::Reserved);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LockLevel {
    /// No lock held.
    #[default]
    None,
    /// Reading; any number of holders.
    Shared,
    /// Intends to write; at most one holder, readers still admitted.
    Reserved,
    /// Waiting for readers to drain; at most one holder, no new readers.
    Pending,
    /// Writing; excludes every other holder.
    Exclusive,
}

impl LockLevel {
    /// Stable numeric code (0 for `None` through 4 for `Exclusive`).
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decide whether a `lock` request needs any work.
    ///
    /// Returns `Ok(false)` when `current` already covers `requested`, and
    /// `Ok(true)` when the backend must upgrade.
    ///
    /// # Errors
    ///
    /// [`VfsError::Misuse`] when the request breaks the protocol:
    /// - `Pending` requested directly
    /// - anything above `Shared` requested while holding nothing
    /// - `Reserved` requested from a level other than `Shared`
    ///
    /// # Example
    ///
    /// ```rust
    /// use anyvfs::LockLevel;
    ///
    /// assert_eq!(LockLevel::None.check_lock(LockLevel::Shared).unwrap(), true);
    /// assert_eq!(LockLevel::Exclusive.check_lock(LockLevel::Shared).unwrap(), false);
    /// assert!(LockLevel::None.check_lock(LockLevel::Exclusive).is_err());
    /// ```
    pub fn check_lock(self, requested: LockLevel) -> Result<bool, VfsError> {
        if self >= requested {
            return Ok(false);
        }
        let allowed = match requested {
            LockLevel::None | LockLevel::Pending => false,
            LockLevel::Shared => self == LockLevel::None,
            LockLevel::Reserved => self == LockLevel::Shared,
            LockLevel::Exclusive => self != LockLevel::None,
        };
        if allowed {
            Ok(true)
        } else {
            Err(VfsError::Misuse { operation: "lock" })
        }
    }

    /// Decide whether an `unlock` request needs any work.
    ///
    /// Only `None` and `Shared` are valid targets. Returns `Ok(false)` when the
    /// holder is already at or below `requested`.
    ///
    /// # Errors
    ///
    /// [`VfsError::Misuse`] for a target above `Shared`.
    pub fn check_unlock(self, requested: LockLevel) -> Result<bool, VfsError> {
        if requested > LockLevel::Shared {
            return Err(VfsError::Misuse { operation: "unlock" });
        }
        Ok(self > requested)
    }

    /// Returns `true` if going from `self` to `requested` passes through
    /// `Pending`.
    #[inline]
    pub fn passes_through_pending(self, requested: LockLevel) -> bool {
        requested == LockLevel::Exclusive
            && matches!(self, LockLevel::Shared | LockLevel::Reserved)
    }
}

impl TryFrom<u8> for LockLevel {
    type Error = VfsError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(LockLevel::None),
            1 => Ok(LockLevel::Shared),
            2 => Ok(LockLevel::Reserved),
            3 => Ok(LockLevel::Pending),
            4 => Ok(LockLevel::Exclusive),
            _ => Err(VfsError::Misuse {
                operation: "lock level",
            }),
        }
    }
}

/// Byte offsets used to emulate [`LockLevel`]s with byte-range locks.
///
/// ```text
/// pending_byte       -> Pending
/// pending_byte + 1   -> Reserved
/// pending_byte + 2.. -> Shared pool (510 bytes)
/// ```
///
/// A shared holder locks one byte of the pool, picked freely (two readers
/// picking the same byte just serialize). `Exclusive` locks the whole
/// [`exclusive_range`](LockBytes::exclusive_range).
///
/// # Example
///
/// ```rust
/// use anyvfs::LockBytes;
///
/// let bytes = LockBytes::default();
/// assert_eq!(bytes.pending_byte(), 0x4000_0000);
/// assert_eq!(bytes.reserved_byte(), 0x4000_0001);
/// assert_eq!(bytes.shared_range(), 0x4000_0002..0x4000_0200);
///
/// assert!(LockBytes::new(u64::MAX).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u64", into = "u64"))]
pub struct LockBytes {
    pending: u64,
}

impl LockBytes {
    /// Layout anchored at `pending_byte`.
    ///
    /// Changing the anchor is only safe when every process sharing the file
    /// uses the same value.
    ///
    /// # Errors
    ///
    /// [`VfsError::Config`] if `pending_byte` exceeds [`MAX_PENDING_BYTE`].
    pub fn new(pending_byte: u64) -> Result<Self, VfsError> {
        if pending_byte > MAX_PENDING_BYTE {
            return Err(VfsError::Config(format!(
                "pending byte {pending_byte:#x} exceeds {MAX_PENDING_BYTE:#x}"
            )));
        }
        Ok(Self::anchored(pending_byte))
    }

    // Callers guarantee `pending <= MAX_PENDING_BYTE`.
    pub(crate) const fn anchored(pending: u64) -> Self {
        Self { pending }
    }

    /// Offset locked for `Pending`.
    #[inline]
    pub const fn pending_byte(&self) -> u64 {
        self.pending
    }

    /// Offset locked for `Reserved`.
    #[inline]
    pub const fn reserved_byte(&self) -> u64 {
        self.pending + 1
    }

    /// First byte of the shared pool.
    #[inline]
    pub const fn shared_first(&self) -> u64 {
        self.pending + 2
    }

    /// The shared pool.
    #[inline]
    pub const fn shared_range(&self) -> Range<u64> {
        self.shared_first()..self.shared_first() + SHARED_SIZE
    }

    /// Pool byte for a shared holder identified by `slot` (any number).
    #[inline]
    pub const fn shared_byte(&self, slot: u64) -> u64 {
        self.shared_first() + slot % SHARED_SIZE
    }

    /// Every byte an exclusive holder locks: both singletons and the pool.
    #[inline]
    pub const fn exclusive_range(&self) -> Range<u64> {
        self.pending..self.shared_first() + SHARED_SIZE
    }

    /// Returns `true` if `offset` is one of the lock bytes.
    #[inline]
    pub const fn contains(&self, offset: u64) -> bool {
        offset >= self.pending && offset < self.shared_first() + SHARED_SIZE
    }

    /// One-based number of the page holding the lock bytes for `page_size`.
    ///
    /// The engine must leave this page unused.
    #[inline]
    pub const fn lock_page(&self, page_size: NonZeroU64) -> u64 {
        self.pending / page_size.get() + 1
    }
}

impl Default for LockBytes {
    fn default() -> Self {
        Self::anchored(DEFAULT_PENDING_BYTE)
    }
}

impl TryFrom<u64> for LockBytes {
    type Error = VfsError;

    fn try_from(pending_byte: u64) -> Result<Self, Self::Error> {
        Self::new(pending_byte)
    }
}

impl From<LockBytes> for u64 {
    fn from(bytes: LockBytes) -> Self {
        bytes.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LockLevel; 5] = [
        LockLevel::None,
        LockLevel::Shared,
        LockLevel::Reserved,
        LockLevel::Pending,
        LockLevel::Exclusive,
    ];

    #[test]
    fn levels_are_ordered() {
        for pair in ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn codes_match_order() {
        for (code, level) in ALL.iter().enumerate() {
            assert_eq!(level.code() as usize, code);
            assert_eq!(LockLevel::try_from(code as u8).unwrap(), *level);
        }
        assert!(LockLevel::try_from(5).is_err());
    }

    #[test]
    fn default_is_none() {
        assert_eq!(LockLevel::default(), LockLevel::None);
    }

    #[test]
    fn lock_requests_at_or_below_current_are_noops() {
        for current in ALL {
            for requested in ALL.iter().copied().filter(|r| *r <= current) {
                assert!(!current.check_lock(requested).unwrap());
            }
        }
    }

    #[test]
    fn pending_is_never_requested_directly() {
        for current in [LockLevel::None, LockLevel::Shared, LockLevel::Reserved] {
            assert!(matches!(
                current.check_lock(LockLevel::Pending),
                Err(VfsError::Misuse { .. })
            ));
        }
    }

    #[test]
    fn none_may_only_go_to_shared() {
        assert!(LockLevel::None.check_lock(LockLevel::Shared).unwrap());
        assert!(LockLevel::None.check_lock(LockLevel::Reserved).is_err());
        assert!(LockLevel::None.check_lock(LockLevel::Exclusive).is_err());
    }

    #[test]
    fn reserved_requires_shared() {
        assert!(LockLevel::Shared.check_lock(LockLevel::Reserved).unwrap());
        assert!(LockLevel::None.check_lock(LockLevel::Reserved).is_err());
    }

    #[test]
    fn exclusive_from_any_held_level() {
        for current in [LockLevel::Shared, LockLevel::Reserved, LockLevel::Pending] {
            assert!(current.check_lock(LockLevel::Exclusive).unwrap());
        }
    }

    #[test]
    fn exclusive_from_shared_passes_through_pending() {
        assert!(LockLevel::Shared.passes_through_pending(LockLevel::Exclusive));
        assert!(LockLevel::Reserved.passes_through_pending(LockLevel::Exclusive));
        assert!(!LockLevel::Pending.passes_through_pending(LockLevel::Exclusive));
        assert!(!LockLevel::Shared.passes_through_pending(LockLevel::Reserved));
    }

    #[test]
    fn unlock_targets() {
        assert!(LockLevel::Exclusive.check_unlock(LockLevel::Shared).unwrap());
        assert!(LockLevel::Shared.check_unlock(LockLevel::None).unwrap());
        assert!(!LockLevel::Shared.check_unlock(LockLevel::Shared).unwrap());
        assert!(!LockLevel::None.check_unlock(LockLevel::None).unwrap());
        assert!(LockLevel::Exclusive.check_unlock(LockLevel::Reserved).is_err());
    }

    #[test]
    fn default_byte_layout() {
        let bytes = LockBytes::default();
        assert_eq!(bytes.pending_byte(), DEFAULT_PENDING_BYTE);
        assert_eq!(bytes.reserved_byte(), DEFAULT_PENDING_BYTE + 1);
        assert_eq!(bytes.shared_first(), DEFAULT_PENDING_BYTE + 2);
        assert_eq!(bytes.shared_range().end - bytes.shared_range().start, 510);
    }

    #[test]
    fn exclusive_covers_everything() {
        let bytes = LockBytes::new(0x1000).unwrap();
        let range = bytes.exclusive_range();
        assert!(range.contains(&bytes.pending_byte()));
        assert!(range.contains(&bytes.reserved_byte()));
        assert!(range.contains(&bytes.shared_range().start));
        assert!(range.contains(&(bytes.shared_range().end - 1)));
        assert_eq!(range.end, bytes.shared_range().end);
    }

    #[test]
    fn shared_byte_stays_in_pool() {
        let bytes = LockBytes::default();
        for slot in [0, 1, 509, 510, 12_345, u64::MAX] {
            assert!(bytes.shared_range().contains(&bytes.shared_byte(slot)));
        }
        assert_eq!(bytes.shared_byte(0), bytes.shared_byte(510));
    }

    #[test]
    fn contains_matches_exclusive_range() {
        let bytes = LockBytes::new(512).unwrap();
        assert!(!bytes.contains(511));
        assert!(bytes.contains(512));
        assert!(bytes.contains(512 + 511));
        assert!(!bytes.contains(512 + 512));
    }

    #[test]
    fn lock_page_number() {
        let bytes = LockBytes::default();
        let page = |size| NonZeroU64::new(size).unwrap();
        assert_eq!(bytes.lock_page(page(4096)), 0x4000_0000 / 4096 + 1);
        assert_eq!(bytes.lock_page(page(1024)), 1_048_577);
        assert_eq!(bytes.lock_page(page(1)), 0x4000_0001);
    }

    #[test]
    fn highest_anchor_fits() {
        let bytes = LockBytes::new(MAX_PENDING_BYTE).unwrap();
        assert_eq!(bytes.exclusive_range().end, u64::MAX);
        assert!(bytes.contains(u64::MAX - 1));
        assert!(!bytes.contains(u64::MAX));
        assert_eq!(bytes.shared_byte(u64::MAX), bytes.shared_first() + u64::MAX % SHARED_SIZE);
    }

    #[test]
    fn anchor_past_the_end_is_rejected() {
        for pending in [MAX_PENDING_BYTE + 1, u64::MAX - 1, u64::MAX] {
            assert!(matches!(LockBytes::new(pending), Err(VfsError::Config(_))));
            assert!(LockBytes::try_from(pending).is_err());
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_checks_anchor() {
        let bytes: LockBytes = serde_json::from_str("4096").unwrap();
        assert_eq!(bytes.pending_byte(), 4096);
        assert_eq!(serde_json::to_string(&bytes).unwrap(), "4096");
        assert!(serde_json::from_str::<LockBytes>(&u64::MAX.to_string()).is_err());
    }
}
