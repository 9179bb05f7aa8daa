//! Buffer reuse and canonical singletons.
//!
//! [`UnitPool`] is the keep-alive free list: releasing a small buffer parks
//! it here instead of handing it back to the allocator, and a later acquire
//! pops it and only grows it if the request exceeds the kept capacity
//! (buffers are never shrunk on reuse). It is an ordinary, testable value
//! type; the handle layer wires one thread-local instance per storage width
//! since `Str` values are thread-confined anyway.
//!
//! [`Singletons`] holds the process-wide canonical strings: the empty
//! string and the 256 single-character Latin-1 strings, created on first
//! use and shared (refcount-bumped) by every constructor that produces such
//! content.

use crate::buffer::UniqueUnits;
use crate::common::Result;
use crate::text::Str;
use crate::unit::CodeUnit;

use std::cell::RefCell;

/// Buffers at or under this many units are eligible for keep-alive.
const KEEPALIVE_MAX_UNITS: usize = 16;
/// Upper bound on parked buffers per width.
const FREE_LIST_LIMIT: usize = 1024;

pub struct UnitPool<W: CodeUnit> {
    free: Vec<UniqueUnits<W>>,
    max_entries: usize,
    max_units: usize,
}

impl<W: CodeUnit> UnitPool<W> {
    pub fn new(max_entries: usize, max_units: usize) -> UnitPool<W> {
        UnitPool {
            free: Vec::new(),
            max_entries,
            max_units,
        }
    }

    pub fn with_defaults() -> UnitPool<W> {
        UnitPool::new(FREE_LIST_LIMIT, KEEPALIVE_MAX_UNITS)
    }

    /// A zero-length buffer with at least `cap` units of capacity, reusing
    /// a parked buffer when one is available.
    pub fn acquire(&mut self, cap: usize) -> Result<UniqueUnits<W>> {
        if let Some(mut kept) = self.free.pop() {
            // Grow on demand only; a kept buffer larger than the request is
            // used as-is.
            kept.grow(cap)?;
            kept.set_len(0);
            return Ok(kept);
        }
        UniqueUnits::try_new(cap)
    }

    /// Park `units` for reuse if it is small enough and the list has spare
    /// capacity. Returns whether the buffer was kept.
    pub fn release(&mut self, units: UniqueUnits<W>) -> bool {
        if units.cap() <= self.max_units && self.free.len() < self.max_entries {
            self.free.push(units);
            true
        } else {
            false
        }
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }
}

pub struct Singletons<W: CodeUnit> {
    empty: Option<Str<W>>,
    latin1: Vec<Option<Str<W>>>,
}

impl<W: CodeUnit> Singletons<W> {
    fn new() -> Singletons<W> {
        Singletons {
            empty: None,
            latin1: (0..256).map(|_| None).collect(),
        }
    }

    /// The canonical zero-length string.
    pub fn empty(&mut self) -> Str<W> {
        if self.empty.is_none() {
            // The one-unit terminator allocation cannot hit the overflow
            // checks.
            let units = UniqueUnits::try_new(0).unwrap().into_shared();
            self.empty = Some(Str::from_shared(units));
        }
        self.empty.as_ref().unwrap().clone()
    }

    /// The canonical single-character string for a Latin-1 ordinal.
    pub fn latin1(&mut self, b: u8) -> Str<W> {
        let slot = &mut self.latin1[b as usize];
        if slot.is_none() {
            let mut units = UniqueUnits::try_new(1).unwrap();
            units.payload_mut()[0] = W::from_u32(b as u32);
            units.set_len(1);
            *slot = Some(Str::from_shared(units.into_shared()));
        }
        slot.as_ref().unwrap().clone()
    }
}

thread_local! {
    static NARROW_POOL: RefCell<UnitPool<u16>> = RefCell::new(UnitPool::with_defaults());
    static WIDE_POOL: RefCell<UnitPool<u32>> = RefCell::new(UnitPool::with_defaults());
    static NARROW_SINGLETONS: RefCell<Singletons<u16>> = RefCell::new(Singletons::new());
    static WIDE_SINGLETONS: RefCell<Singletons<u32>> = RefCell::new(Singletons::new());
}

pub(crate) fn with_narrow_pool<R>(f: impl FnOnce(&mut UnitPool<u16>) -> R) -> R {
    NARROW_POOL.with(|p| f(&mut p.borrow_mut()))
}

pub(crate) fn with_wide_pool<R>(f: impl FnOnce(&mut UnitPool<u32>) -> R) -> R {
    WIDE_POOL.with(|p| f(&mut p.borrow_mut()))
}

pub(crate) fn with_narrow_singletons<R>(f: impl FnOnce(&mut Singletons<u16>) -> R) -> R {
    NARROW_SINGLETONS.with(|s| f(&mut s.borrow_mut()))
}

pub(crate) fn with_wide_singletons<R>(f: impl FnOnce(&mut Singletons<u32>) -> R) -> R {
    WIDE_SINGLETONS.with(|s| f(&mut s.borrow_mut()))
}

// Called from the buffer drop path. Must tolerate thread teardown and
// reentrant pool use; when the list is unreachable the buffer simply
// deallocates.
pub(crate) fn reclaim_narrow(units: UniqueUnits<u16>) {
    let _ = NARROW_POOL.try_with(|p| {
        if let Ok(mut pool) = p.try_borrow_mut() {
            pool.release(units);
        }
    });
}

pub(crate) fn reclaim_wide(units: UniqueUnits<u32>) {
    let _ = WIDE_POOL.try_with(|p| {
        if let Ok(mut pool) = p.try_borrow_mut() {
            pool.release(units);
        }
    });
}
