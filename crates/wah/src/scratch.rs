//! Thread-local stack allocator backing the in-place bitwise assignment
//! operators (`and_assign`/`and_not_assign`/`or_assign` in
//! [`crate::ops`]).
//!
//! `dst := dst op src` cannot stream words directly out of `dst.data`
//! while also rebuilding `dst` in place: the rebuild starts by resetting
//! `dst`, which clears the very buffer the merge still needs to read
//! from. The reference algorithm sidesteps this by snapshotting `dst`'s
//! word buffer into scratch memory first; a scoped stack allocation is
//! exactly that kind of short-lived, LIFO-scoped copy.

use std::cell::RefCell;
use std::mem::size_of;

use region_alloc::{AllocFlags, StackPool};

thread_local! {
    static SCRATCH: RefCell<StackPool> = RefCell::new(StackPool::new(0));
}

/// Copies `words` into a freshly pushed stack-pool frame and calls `f`
/// with a view of the copy, popping the frame again before returning.
pub(crate) fn with_snapshot<R>(words: &[u32], f: impl FnOnce(&[u32]) -> R) -> R {
    if words.is_empty() {
        return f(&[]);
    }
    SCRATCH.with(|pool| {
        let mut pool = pool.borrow_mut();
        let cookie = pool.push();
        let bytes = words.len() * size_of::<u32>();
        let ptr = pool.alloc(bytes, AllocFlags::RAW);
        // SAFETY: `ptr` is a fresh `bytes`-byte allocation, disjoint from
        // `words` (an already-initialized, independent buffer).
        unsafe {
            std::ptr::copy_nonoverlapping(words.as_ptr().cast::<u8>(), ptr.as_ptr(), bytes);
        }
        // SAFETY: the copy above initialized `words.len()` `u32`s at
        // `ptr`, which `align_for_size` aligns to at least 4 bytes for
        // any allocation of 4 or more bytes.
        let snapshot = unsafe { std::slice::from_raw_parts(ptr.as_ptr().cast::<u32>(), words.len()) };
        let result = f(snapshot);
        pool.rewind(Some(cookie));
        result
    })
}
