//! # Arena
//!
//! A monotonic bump allocator that frees only at destruction.
//!
//! The memtable (see the `memtable` crate) never frees individual entries;
//! instead, every entry byte lives in one of these arenas, and the whole
//! arena is released in one shot when the memtable holding it is dropped.
//! There is no free list and none should be added — the memtable's lifetime
//! *is* the reclamation granularity.
//!
//! Blocks are allocated directly through [`std::alloc`] (rather than backed
//! by `Vec<u8>`) so that every block's start address carries a real alignment
//! guarantee instead of relying on an allocator implementation detail.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Size of a standard block, in bytes.
const BLOCK_SIZE: usize = 4096;

/// A single heap allocation backing one or more entries.
struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Block {
    fn new(size: usize, align: usize) -> Self {
        let layout = Layout::from_size_align(size, align).expect("invalid block layout");
        // SAFETY: `layout` has non-zero size (callers never request a
        // zero-byte block) and a valid power-of-two alignment.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = match NonNull::new(raw) {
            Some(p) => p,
            None => handle_alloc_error(layout),
        };
        Block { ptr, layout }
    }

    fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

// A `Block` owns its allocation exclusively; it is only ever reachable
// through `Arena`'s mutex, so handing it across threads is sound.
unsafe impl Send for Block {}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: `self.ptr`/`self.layout` are exactly what `alloc_zeroed`
        // was called with in `Block::new`, and this is the only place that
        // deallocates it.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

struct Inner {
    /// All blocks ever allocated, in allocation order. Never shrinks; a
    /// block's address is never reused or moved once pushed here, since
    /// growing this `Vec` only relocates the `Block` handles, not the heap
    /// memory each one points at.
    blocks: Vec<Block>,
    alloc_ptr: *mut u8,
    alloc_remaining: usize,
}

/// A bump allocator handing out byte regions that live until the arena
/// itself is dropped.
///
/// `allocate`/`allocate_aligned` take `&self`, not `&mut self`: the single
/// writer that owns a memtable calls them while other threads may
/// concurrently read already-published entries through the memtable's
/// ordered set. The mutex inside exists only to let `&self` stand in for
/// "the caller guarantees single-writer access," not to arbitrate real
/// contention — there never is any, by contract.
pub struct Arena {
    inner: Mutex<Inner>,
    memory_usage: AtomicUsize,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    /// Creates an empty arena. No blocks are allocated until the first call
    /// to `allocate`/`allocate_aligned`.
    pub fn new() -> Self {
        Arena {
            inner: Mutex::new(Inner {
                blocks: Vec::new(),
                alloc_ptr: std::ptr::null_mut(),
                alloc_remaining: 0,
            }),
            memory_usage: AtomicUsize::new(0),
        }
    }

    /// Returns a pointer to `n` freshly allocated, zeroed bytes with no
    /// alignment guarantee beyond natural byte alignment.
    ///
    /// The returned region is valid for as long as this arena is alive and
    /// is never moved or freed before then.
    ///
    /// # Panics
    /// Panics (debug-only assertion) if `n == 0`; zero-byte allocations are
    /// a caller error, not a valid request.
    pub fn allocate(&self, n: usize) -> *mut u8 {
        debug_assert!(n > 0, "arena allocations must request at least 1 byte");
        let mut inner = self.inner.lock().expect("arena mutex poisoned");
        if n <= inner.alloc_remaining {
            let result = inner.alloc_ptr;
            // SAFETY: `n <= alloc_remaining`, so the resulting pointer stays
            // within the current block.
            inner.alloc_ptr = unsafe { inner.alloc_ptr.add(n) };
            inner.alloc_remaining -= n;
            return result;
        }
        self.allocate_fallback(&mut inner, n)
    }

    /// Like [`allocate`](Self::allocate), but the returned address is
    /// aligned to `max(size_of::<usize>(), 8)`.
    pub fn allocate_aligned(&self, n: usize) -> *mut u8 {
        debug_assert!(n > 0, "arena allocations must request at least 1 byte");
        let align = Self::alignment();
        let mut inner = self.inner.lock().expect("arena mutex poisoned");

        let current_mod = (inner.alloc_ptr as usize) & (align - 1);
        let slop = if current_mod == 0 {
            0
        } else {
            align - current_mod
        };

        if n + slop <= inner.alloc_remaining {
            // SAFETY: `slop + n <= alloc_remaining`, so both the
            // slop-adjusted start and the end of the allocation stay within
            // the current block.
            let result = unsafe { inner.alloc_ptr.add(slop) };
            inner.alloc_ptr = unsafe { result.add(n) };
            inner.alloc_remaining -= n + slop;
            debug_assert_eq!(result as usize % align, 0);
            return result;
        }

        // Fallback: same oversized-vs-standard-block split as `allocate`'s
        // fallback, just with every fresh block requested at `align` instead
        // of natural byte alignment (a block allocated at offset 0 with a
        // given alignment is aligned by construction).
        let result = self.allocate_aligned_fallback(&mut inner, n, align);
        debug_assert_eq!(result as usize % align, 0);
        result
    }

    /// Current estimate of total bytes held by this arena: the sum of every
    /// block's size plus a per-block bookkeeping word. Monotone
    /// non-decreasing; safe to read from any thread.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }

    fn allocate_fallback(&self, inner: &mut Inner, n: usize) -> *mut u8 {
        if n > BLOCK_SIZE / 4 {
            // Oversized request: give it a dedicated block and leave the
            // current block's remainder alone for future small allocations.
            log::debug!("arena: oversized allocation of {n} bytes gets a dedicated block");
            return self.new_block(inner, n, 1);
        }
        let ptr = self.new_block(inner, BLOCK_SIZE, 1);
        log::debug!("arena: block rollover, {} bytes of the previous block's remainder discarded", inner.alloc_remaining);
        // SAFETY: `n <= BLOCK_SIZE` (checked above via the `n > BLOCK_SIZE/4`
        // branch not taken, and `BLOCK_SIZE/4 < BLOCK_SIZE`), so `ptr.add(n)`
        // stays within the freshly allocated block.
        inner.alloc_ptr = unsafe { ptr.add(n) };
        inner.alloc_remaining = BLOCK_SIZE - n;
        ptr
    }

    /// Same oversized-vs-standard-block policy as `allocate_fallback`, but
    /// every fresh block is requested at `align` so the address handed back
    /// satisfies `allocate_aligned`'s contract.
    fn allocate_aligned_fallback(&self, inner: &mut Inner, n: usize, align: usize) -> *mut u8 {
        if n > BLOCK_SIZE / 4 {
            log::debug!("arena: oversized aligned allocation of {n} bytes gets a dedicated block");
            return self.new_block(inner, n, align);
        }
        let ptr = self.new_block(inner, BLOCK_SIZE, align);
        log::debug!("arena: aligned block rollover, {} bytes of the previous block's remainder discarded", inner.alloc_remaining);
        // SAFETY: `n <= BLOCK_SIZE` by the branch not taken above, so
        // `ptr.add(n)` stays within the freshly allocated block.
        inner.alloc_ptr = unsafe { ptr.add(n) };
        inner.alloc_remaining = BLOCK_SIZE - n;
        ptr
    }

    fn new_block(&self, inner: &mut Inner, size: usize, align: usize) -> *mut u8 {
        let align = align.max(1);
        let block = Block::new(size, align);
        let ptr = block.as_mut_ptr();
        inner.blocks.push(block);
        let usage = size + std::mem::size_of::<usize>();
        self.memory_usage.fetch_add(usage, Ordering::Relaxed);
        ptr
    }

    fn alignment() -> usize {
        std::mem::size_of::<usize>().max(8)
    }
}
