use std::{
    cell::{Cell, UnsafeCell},
    mem::size_of,
    ptr,
    sync::atomic::{AtomicUsize, Ordering},
};

use tracing::trace;

use crate::options::BLOCK_SIZE;

const POINTER_LENGTH: usize = size_of::<*mut u8>();

/// Alignment of every `allocate_aligned` result and of every block start.
pub const ALIGN: usize = if POINTER_LENGTH > 8 {
    POINTER_LENGTH
} else {
    8
};

/// Bookkeeping charged to `memory_usage` for each block.
pub const BLOCK_OVERHEAD: usize = size_of::<Vec<Unit>>();

const _: () = assert!(ALIGN.is_power_of_two(), "pointer size should be a power of 2");
const _: () = assert!(std::mem::align_of::<Unit>() >= ALIGN);

/// Blocks are vectors of `Unit` so that their start is `ALIGN`-aligned.
#[repr(C, align(16))]
struct Unit {
    _bytes: [u8; 16],
}

/// Bump allocator handing out byte ranges from growable blocks.
///
/// Individual ranges are never freed; every block is released when the
/// arena is dropped. The arena is `Send` but not `Sync`: allocation goes
/// through `&self` and must stay on one thread at a time.
pub struct Arena {
    block_size: usize,
    alloc_ptr: Cell<*mut u8>,
    remaining: Cell<usize>,
    usage: AtomicUsize,
    blocks: UnsafeCell<Vec<Vec<Unit>>>,
}

// Block memory is owned by `blocks`; the raw cursor only points into it.
unsafe impl Send for Arena {}

impl Default for Arena {
    fn default() -> Self {
        Arena::new()
    }
}

impl Arena {
    pub fn new() -> Self {
        Arena::with_block_size(BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        Arena {
            block_size,
            alloc_ptr: Cell::new(ptr::null_mut()),
            remaining: Cell::new(0),
            usage: AtomicUsize::new(0),
            blocks: UnsafeCell::new(Vec::new()),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns `n` bytes with no alignment guarantee. The memory is not
    /// zeroed.
    pub fn allocate(&self, n: usize) -> *mut u8 {
        assert!(n > 0, "zero sized arena allocation");
        if n <= self.remaining.get() {
            let result = self.alloc_ptr.get();
            unsafe {
                self.alloc_ptr.set(result.add(n));
            }
            self.remaining.set(self.remaining.get() - n);
            result
        } else {
            self.allocate_fallback(n)
        }
    }

    /// Returns `n` bytes aligned to `ALIGN`. The memory is not zeroed.
    pub fn allocate_aligned(&self, n: usize) -> *mut u8 {
        assert!(n > 0, "zero sized arena allocation");
        let current_mod = self.alloc_ptr.get() as usize & (ALIGN - 1);
        let slop = if current_mod == 0 {
            0
        } else {
            ALIGN - current_mod
        };
        let needed = n + slop;
        if needed <= self.remaining.get() {
            let result = unsafe {
                let result = self.alloc_ptr.get().add(slop);
                self.alloc_ptr.set(self.alloc_ptr.get().add(needed));
                result
            };
            self.remaining.set(self.remaining.get() - needed);
            result
        } else {
            // Fresh blocks always start aligned.
            self.allocate_fallback(n)
        }
    }

    /// Ranges are reclaimed only when the whole arena is dropped.
    pub fn deallocate(&self, _ptr: *mut u8, _n: usize) {}

    /// Total bytes of block memory handed out, including per-block
    /// bookkeeping. Safe to read from any thread.
    pub fn memory_usage(&self) -> usize {
        self.usage.load(Ordering::Relaxed)
    }

    pub fn block_count(&self) -> usize {
        unsafe { (*self.blocks.get()).len() }
    }

    fn allocate_fallback(&self, n: usize) -> *mut u8 {
        if n > self.block_size / 4 {
            // Large objects get their own block so the shared block keeps
            // its remaining space.
            return self.allocate_new_block(n);
        }

        // The remainder of the current block is abandoned.
        let block = self.allocate_new_block(self.block_size);
        unsafe {
            self.alloc_ptr.set(block.add(n));
        }
        self.remaining.set(self.block_size - n);
        block
    }

    fn allocate_new_block(&self, block_bytes: usize) -> *mut u8 {
        let units = (block_bytes + size_of::<Unit>() - 1) / size_of::<Unit>();
        let mut v: Vec<Unit> = Vec::with_capacity(units);
        let r = v.as_mut_ptr() as *mut u8;
        unsafe {
            (*self.blocks.get()).push(v);
        }
        self.usage
            .fetch_add(block_bytes + BLOCK_OVERHEAD, Ordering::Relaxed);
        trace!(
            block_bytes,
            dedicated = block_bytes != self.block_size,
            "arena allocated a new block"
        );
        r
    }
}
