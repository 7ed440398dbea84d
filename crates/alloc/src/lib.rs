//! A region (arena) allocator that also owns a destructor list for
//! referenced host objects, iterators, and nested allocators.
//!
//! Every transient buffer produced while servicing one request -- string
//! copies, argument vectors, constructed `Serialization` trees -- is pinned
//! to one `Allocator` instance for its lifetime. There is no way to free an
//! individual allocation; the whole `Allocator` is torn down at once, which
//! is also when any owned destructor-bearing reference actually drops.

mod encoding;

use std::any::Any;
use std::cell::RefCell;

pub use encoding::Encoding;
use ligature_errors::{Error, ErrorCode, Result};

/// Bump allocation is in units of this base chunk size, per `bumpalo`'s own
/// doubling-chunk growth policy; kept here only for documentation purposes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Cumulative counters over one `Allocator`'s lifetime, mirroring the kind of
/// instrumentation a production allocator wrapper exposes for diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocatorStats {
    pub alloc_ops: u64,
    pub bytes_allocated: u64,
    pub references_retained: u64,
    pub regions_taken_over: u64,
}

/// An arena allocator with an attached destructor list.
///
/// Allocation is bump-pointer inside the current `bumpalo::Bump` region,
/// which grows its own backing chunks as needed. `regions` additionally
/// holds bump arenas absorbed from other `Allocator`s via [`Allocator::takeover`];
/// those regions are kept alive for their existing allocations but are never
/// themselves the target of new allocations.
pub struct Allocator {
    primary: bumpalo::Bump,
    regions: RefCell<Vec<bumpalo::Bump>>,
    references: RefCell<Vec<Box<dyn Any>>>,
    stats: RefCell<AllocatorStats>,
    /// Set for an `Allocator` built over a caller-supplied first chunk, which
    /// [`Allocator::takeover`] therefore refuses to absorb into another
    /// allocator (it cannot be freed by us).
    caller_provided: bool,
}

impl Allocator {
    pub fn new() -> Self {
        Allocator {
            primary: bumpalo::Bump::new(),
            regions: RefCell::new(Vec::new()),
            references: RefCell::new(Vec::new()),
            stats: RefCell::new(AllocatorStats::default()),
            caller_provided: false,
        }
    }

    /// Build an `Allocator` whose first chunk is sized up front. Analogous to
    /// a caller-provided first chunk: [`Allocator::takeover`] will refuse to
    /// merge this allocator into another, since a pre-sized first region is
    /// assumed to be owned by the caller rather than freely transferable.
    pub fn with_capacity(bytes: usize) -> Self {
        Allocator {
            primary: bumpalo::Bump::with_capacity(bytes),
            regions: RefCell::new(Vec::new()),
            references: RefCell::new(Vec::new()),
            stats: RefCell::new(AllocatorStats::default()),
            caller_provided: true,
        }
    }

    pub fn stats(&self) -> AllocatorStats {
        *self.stats.borrow()
    }

    fn record_alloc(&self, bytes: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.alloc_ops += 1;
        stats.bytes_allocated += bytes as u64;
    }

    /// Allocate `size` bytes aligned to `alignment`, which must be a power of
    /// two no larger than the platform's maximum alignment. Returns a byte
    /// slice living as long as `self`.
    pub fn alloc(&self, size: usize, alignment: usize) -> Result<&mut [u8]> {
        if !alignment.is_power_of_two() || alignment > std::mem::align_of::<u128>() {
            return Err(Error::new(
                ErrorCode::OutOfRangeError,
                format!("alignment {alignment} is not a supported power of two"),
            ));
        }
        let layout = std::alloc::Layout::from_size_align(size, alignment)
            .map_err(|e| Error::new(ErrorCode::NoMemError, e.to_string()))?;
        self.record_alloc(size);
        // Safety: `layout` has non-zero alignment verified above; bumpalo
        // initializes the returned region to zero only via `alloc_layout`
        // when asked, so we zero it ourselves for a predictable `alloc`.
        let ptr = self.primary.alloc_layout(layout);
        let slice = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), size) };
        slice.fill(0);
        Ok(slice)
    }

    /// Copy `bytes` into the arena, returning a slice with the same lifetime
    /// as `self`.
    pub fn copy_bytes<'a>(&'a self, bytes: &[u8]) -> &'a [u8] {
        self.record_alloc(bytes.len());
        self.primary.alloc_slice_copy(bytes)
    }

    /// Copy a UTF-8 string into the arena.
    pub fn copy_string<'a>(&'a self, s: &str) -> &'a str {
        self.record_alloc(s.len());
        self.primary.alloc_str(s)
    }

    /// Copy `bytes`, already encoded as `encoding`, into the arena and
    /// zero-terminate in that encoding's native unit. The returned slice
    /// includes the terminator but callers interested only in the string's
    /// content should use `bytes.len()` from the original input.
    pub fn copy_string_enc<'a>(&'a self, bytes: &[u8], encoding: Encoding) -> &'a [u8] {
        let unit = encoding.unit_size();
        let total = bytes.len() + unit;
        self.record_alloc(total);
        let dest = self.primary.alloc_slice_fill_copy(total, 0u8);
        dest[..bytes.len()].copy_from_slice(bytes);
        dest
    }

    /// Register an owned, destructor-bearing value (a host object, an
    /// iterator, or a nested `Allocator`) so it is dropped when this
    /// `Allocator` is dropped. Returns a stable reference valid for as long
    /// as `self` lives.
    pub fn retain<T: Any>(&self, value: T) -> &T {
        let mut refs = self.references.borrow_mut();
        refs.push(Box::new(value));
        self.stats.borrow_mut().references_retained += 1;
        let boxed: &Box<dyn Any> = refs.last().unwrap();
        // Safety: the `Box<dyn Any>` is heap-allocated and never moved once
        // pushed (the `Vec` only ever grows by appending), and it outlives
        // `self` for exactly as long as `self` is alive, matching the
        // returned reference's lifetime.
        let ptr: *const T = boxed.downcast_ref::<T>().expect("just inserted").as_ref();
        unsafe { &*ptr }
    }

    /// Allocate a nested `Allocator`, owned by `self`.
    pub fn alloc_allocator(&self) -> &Allocator {
        self.retain(Allocator::new())
    }

    /// Splice `other`'s bump regions behind this allocator's own chain, and
    /// append its reference list. `other` is left as an empty, freshly-usable
    /// `Allocator`. Fails if `other`'s first chunk is caller-provided, since
    /// that memory is not ours to adopt.
    pub fn takeover(&self, other: &mut Allocator) -> Result<()> {
        if other.caller_provided {
            return Err(Error::new(
                ErrorCode::InvalidAccess,
                "cannot take over an allocator with a caller-provided first chunk",
            ));
        }
        let taken = std::mem::replace(&mut other.primary, bumpalo::Bump::new());
        self.regions.borrow_mut().push(taken);
        self.regions
            .borrow_mut()
            .append(&mut other.regions.borrow_mut());
        self.references
            .borrow_mut()
            .append(&mut other.references.borrow_mut());
        self.stats.borrow_mut().regions_taken_over += 1;
        Ok(())
    }

    /// Total bytes currently allocated across the primary region and any
    /// taken-over regions.
    pub fn allocated_bytes(&self) -> usize {
        let mut total = self.primary.allocated_bytes();
        for region in self.regions.borrow().iter() {
            total += region.allocated_bytes();
        }
        total
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("allocated_bytes", &self.allocated_bytes())
            .field("references", &self.references.borrow().len())
            .finish()
    }
}
