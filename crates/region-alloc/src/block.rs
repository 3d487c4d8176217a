use alloc::alloc::{alloc as raw_alloc, dealloc as raw_dealloc, handle_alloc_error, Layout};
use core::ptr::NonNull;

use crate::{round_up, PAGE_SIZE};

/// A single heap-allocated block backing a run of frames.
///
/// Blocks are never split; an allocation that does not fit in the
/// remaining space of a block moves on to the next (or a fresh) block.
pub(crate) struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Block {
    /// Allocates a new block able to hold at least `size_hint` bytes, sized
    /// per the running-mean growth policy and rounded up to the page size.
    pub(crate) fn new(size_hint: usize, minsize: usize, mean: usize) -> Self {
        let mut size = size_hint.max(minsize);
        size = size.max(64 * mean.max(1));
        size = round_up(size, PAGE_SIZE);

        let layout = Layout::from_size_align(size, PAGE_SIZE.min(16)).expect("block size overflow");
        // SAFETY: `layout` has non-zero size.
        let ptr = unsafe { raw_alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };
        Self { ptr, layout }
    }

    pub(crate) fn size(&self) -> usize {
        self.layout.size()
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Byte offset one past the end of the block.
    pub(crate) fn end_offset(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`layout` are exactly as returned by `alloc`.
        unsafe { raw_dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Should a candidate block of `candidate_size` bytes be kept when we are
/// looking to satisfy an allocation of `requested` bytes given the running
/// mean allocation size `mean`? Mirrors the stack/ring reclamation
/// heuristic: keep blocks clearly bigger than average, discard the rest.
pub(crate) fn worth_keeping(candidate_size: usize, requested: usize, mean: usize) -> bool {
    candidate_size >= requested && candidate_size > 8 * mean.max(1)
}
