//! Obstack-style region allocators for scoped scratch allocation.
//!
//! This crate provides two allocators built around the idea of a *frame*:
//! a scope of allocations that is released all at once.
//!
//! - [`stack`]: a LIFO chain of frames (like `alloca`, but backed by a chain
//!   of heap blocks). Only the most recently pushed frame may be popped.
//! - [`ring`]: a ring of frames that may be released out of order. A frame's
//!   memory is only returned to the allocator once every older frame in the
//!   ring has also been released.
//!
//! Both allocators round block sizes up to the page size and grow new
//! blocks in proportion to the running average allocation size, so that a
//! workload with many small scratch allocations does not pay for a full
//! page on every block rollover.
//!
//! Neither allocator supports freeing single allocations; memory is only
//! reclaimed when a whole frame is released.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod ring;
pub mod stack;

mod block;

pub use ring::RingPool;
pub use stack::StackPool;

/// Page size assumed by both allocators when rounding block sizes.
///
/// This is a conservative default; it does not need to match the host's
/// actual page size for correctness, only for how generously blocks are
/// rounded up.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel passed as the `old_size` of a `realloc` when the caller does
/// not know (or did not track) the size of the original allocation.
///
/// Both allocators require a known old size; passing this sentinel is a
/// programmer error and panics.
pub const UNKNOWN_SIZE: usize = usize::MAX;

bitflags::bitflags! {
    /// Flags accepted by `alloc`/`realloc`/`free`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllocFlags: u32 {
        /// Skip zero-filling the returned region.
        const RAW = 1 << 0;
    }
}

#[inline]
const fn round_up(value: usize, boundary: usize) -> usize {
    (value + boundary - 1) & !(boundary - 1)
}

/// Picks the natural alignment for an allocation of `size` bytes: 1, 2, 4,
/// 8 or 16 depending on whether `size` is `<2`, `<4`, `<8`, `<16` or `>=16`.
#[inline]
const fn align_for_size(size: usize) -> usize {
    match size {
        0..=1 => 1,
        2..=3 => 2,
        4..=7 => 4,
        8..=15 => 8,
        _ => 16,
    }
}

#[inline]
fn is_aligned_to(ptr: *const u8, align: usize) -> bool {
    (ptr as usize) & (align - 1) == 0
}
