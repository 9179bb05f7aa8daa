//! Reference-counted code-unit buffers.
//!
//! There is a lot of unsafe code here. The layout is a header (capacity,
//! logical length, strong count) followed inline by `cap + 1` code units;
//! the unit at index `len` is always a zero terminator for interop and must
//! never be read as data. A buffer is mutable only through [`UniqueUnits`]
//! (strong count of exactly one); once shared as [`Units`] it is read-only
//! until the count drops back to one.

use crate::common::Result;
use crate::unit::CodeUnit;

use std::alloc::{alloc_zeroed, dealloc, realloc, Layout};
use std::cell::Cell;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::slice;

#[repr(C)]
struct UnitsHeader {
    // Payload capacity in units, terminator excluded.
    cap: usize,
    // Logical length; the unit at this index is the terminator.
    len: usize,
    // We only have "strong counts".
    count: Cell<usize>,
}

/// A uniquely owned buffer: resizable, writable.
#[repr(transparent)]
pub struct UniqueUnits<W: CodeUnit>(*mut UnitsHeader, PhantomData<W>);

/// A shared, refcounted buffer: read-only.
#[repr(transparent)]
pub struct Units<W: CodeUnit>(*const UnitsHeader, PhantomData<W>);

fn layout<W: CodeUnit>(cap: usize) -> Result<Layout> {
    let bytes = cap
        .checked_add(1)
        .and_then(|units| units.checked_mul(mem::size_of::<W>()))
        .and_then(|payload| payload.checked_add(mem::size_of::<UnitsHeader>()));
    match bytes {
        Some(sz) if sz <= isize::max_value() as usize => {
            Ok(Layout::from_size_align(sz, mem::align_of::<UnitsHeader>()).unwrap())
        }
        _ => err!("string of {} code units exceeds the maximum allocation size", cap),
    }
}

impl<W: CodeUnit> UniqueUnits<W> {
    pub fn try_new(cap: usize) -> Result<UniqueUnits<W>> {
        let layout = layout::<W>(cap)?;
        unsafe {
            let alloced = alloc_zeroed(layout) as *mut UnitsHeader;
            if alloced.is_null() {
                return err!("allocation of {} code units failed", cap);
            }
            ptr::write(
                alloced,
                UnitsHeader {
                    cap,
                    len: 0,
                    count: Cell::new(1),
                },
            );
            Ok(UniqueUnits(alloced, PhantomData))
        }
    }

    fn header(&self) -> &UnitsHeader {
        unsafe { &*self.0 }
    }

    pub fn cap(&self) -> usize {
        self.header().cap
    }

    pub fn len(&self) -> usize {
        self.header().len
    }

    fn data_ptr(&self) -> *mut W {
        unsafe { self.0.offset(1) as *mut W }
    }

    /// Set the logical length and write the terminator at it.
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.cap());
        unsafe {
            (*self.0).len = len;
            ptr::write(self.data_ptr().add(len), W::default());
        }
    }

    /// The full writable payload (`cap` units). The region past `len` is
    /// zero-initialized, never uninitialized.
    pub fn payload_mut(&mut self) -> &mut [W] {
        unsafe { slice::from_raw_parts_mut(self.data_ptr(), self.cap()) }
    }

    pub fn as_slice(&self) -> &[W] {
        unsafe { slice::from_raw_parts(self.data_ptr(), self.len()) }
    }

    unsafe fn realloc_cap(&mut self, new_cap: usize) -> Result<()> {
        let old_cap = self.cap();
        let new_layout = layout::<W>(new_cap)?;
        let grown = realloc(
            self.0 as *mut u8,
            layout::<W>(old_cap).unwrap(),
            new_layout.size(),
        ) as *mut UnitsHeader;
        if grown.is_null() {
            return err!("reallocation to {} code units failed", new_cap);
        }
        self.0 = grown;
        (*self.0).cap = new_cap;
        if new_cap > old_cap {
            // realloc leaves the tail uninitialized; zero it (this also
            // restores the terminator region).
            ptr::write_bytes(
                self.data_ptr().add(old_cap + 1),
                0u8,
                new_cap - old_cap,
            );
        }
        Ok(())
    }

    /// Grow-only capacity change; existing content and length are kept.
    pub fn grow(&mut self, new_cap: usize) -> Result<()> {
        if new_cap <= self.cap() {
            return Ok(());
        }
        unsafe { self.realloc_cap(new_cap) }
    }

    /// Reallocate to exactly `new_len` units, preserving content up to
    /// `min(len, new_len)`, and re-terminate at `new_len`.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if new_len != self.cap() {
            unsafe { self.realloc_cap(new_len)? };
        }
        self.set_len(new_len);
        Ok(())
    }

    pub fn into_shared(self) -> Units<W> {
        let res = Units(self.0, PhantomData);
        mem::forget(self);
        res
    }
}

impl<W: CodeUnit> Drop for UniqueUnits<W> {
    fn drop(&mut self) {
        let header = self.header();
        debug_assert_eq!(header.count.get(), 1);
        let l = layout::<W>(header.cap).unwrap();
        unsafe { dealloc(self.0 as *mut u8, l) }
    }
}

impl<W: CodeUnit> Clone for Units<W> {
    fn clone(&self) -> Units<W> {
        let header = unsafe { &*self.0 };
        header.count.set(header.count.get() + 1);
        Units(self.0, PhantomData)
    }
}

impl<W: CodeUnit> Drop for Units<W> {
    fn drop(&mut self) {
        let header = unsafe { &*self.0 };
        let cur = header.count.get();
        debug_assert!(cur > 0);
        if cur == 1 {
            // Last reference: offer the buffer to the keep-alive free list
            // instead of deallocating outright.
            W::reclaim(UniqueUnits(self.0 as *mut _, PhantomData));
            return;
        }
        header.count.set(cur - 1);
    }
}

impl<W: CodeUnit> Units<W> {
    fn header(&self) -> &UnitsHeader {
        unsafe { &*self.0 }
    }

    pub fn len(&self) -> usize {
        self.header().len
    }

    pub fn cap(&self) -> usize {
        self.header().cap
    }

    pub fn is_unique(&self) -> bool {
        self.header().count.get() == 1
    }

    pub fn as_slice(&self) -> &[W] {
        unsafe { slice::from_raw_parts(self.0.offset(1) as *const W, self.len()) }
    }

    /// Stable address of the unit payload; used for identity checks against
    /// the canonical singletons.
    pub fn as_ptr(&self) -> *const W {
        unsafe { self.0.offset(1) as *const W }
    }

    /// Resize in place. Only legal while uniquely owned; resizing a shared
    /// buffer (the singletons included) is an error.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if !self.is_unique() {
            return err!("cannot resize a shared string buffer");
        }
        let mut unique = mem::ManuallyDrop::new(UniqueUnits::<W>(
            self.0 as *mut UnitsHeader,
            PhantomData,
        ));
        let res = unique.resize(new_len);
        // realloc may have moved the allocation even on the error path's
        // successful sub-steps; re-read the pointer unconditionally.
        self.0 = unique.0 as *const UnitsHeader;
        res
    }
}

/// An append-only decode/encode destination.
///
/// Pre-sized to an upper bound by the caller, grown by at least doubling on
/// overflow, and shrunk to the true length exactly once in [`finish`].
///
/// [`finish`]: UnitBuilder::finish
pub struct UnitBuilder<W: CodeUnit> {
    data: UniqueUnits<W>,
    write_head: usize,
}

impl<W: CodeUnit> UnitBuilder<W> {
    pub fn with_capacity(cap: usize) -> Result<UnitBuilder<W>> {
        let data = W::with_pool(|p| p.acquire(cap))?;
        Ok(UnitBuilder { data, write_head: 0 })
    }

    pub fn len(&self) -> usize {
        self.write_head
    }

    pub fn as_slice(&self) -> &[W] {
        &self.data.payload()[..self.write_head]
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let need = match self.write_head.checked_add(additional) {
            Some(n) => n,
            None => return err!("string length overflow"),
        };
        let cap = self.data.cap();
        if need > cap {
            self.data.grow(std::cmp::max(need, cap.saturating_mul(2)))?;
        }
        Ok(())
    }

    pub fn push(&mut self, unit: W) -> Result<()> {
        self.reserve(1)?;
        self.data.payload_mut()[self.write_head] = unit;
        self.write_head += 1;
        Ok(())
    }

    pub fn push_char(&mut self, cp: u32) -> Result<()> {
        let n = W::len_for_char(cp);
        self.reserve(n)?;
        let head = self.write_head;
        W::put_char(cp, &mut self.data.payload_mut()[head..]);
        self.write_head += n;
        Ok(())
    }

    pub fn push_units(&mut self, units: &[W]) -> Result<()> {
        self.reserve(units.len())?;
        let head = self.write_head;
        self.data.payload_mut()[head..head + units.len()].copy_from_slice(units);
        self.write_head += units.len();
        Ok(())
    }

    pub fn push_str(&mut self, s: &str) -> Result<()> {
        for c in s.chars() {
            self.push_char(c as u32)?;
        }
        Ok(())
    }

    /// Discard everything written at or past `len`. Used by the streaming
    /// decoders to back output off to the start of an incomplete sequence.
    pub fn truncate(&mut self, len: usize) {
        assert!(len <= self.write_head);
        self.write_head = len;
    }

    /// Shrink to the written length and freeze into a shared buffer.
    pub fn finish(mut self) -> Units<W> {
        let head = self.write_head;
        // Shrinking a live allocation cannot hit the overflow checks.
        self.data.resize(head).unwrap();
        self.data.into_shared()
    }
}

impl<W: CodeUnit> UniqueUnits<W> {
    fn payload(&self) -> &[W] {
        unsafe { slice::from_raw_parts(self.data_ptr() as *const W, self.cap()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_terminate() {
        let mut u = UniqueUnits::<u16>::try_new(4).unwrap();
        assert_eq!(u.cap(), 4);
        assert_eq!(u.len(), 0);
        u.payload_mut().copy_from_slice(&[1, 2, 3, 4]);
        u.set_len(4);
        assert_eq!(u.as_slice(), &[1, 2, 3, 4]);
        unsafe {
            // The hidden terminator sits one past the logical length.
            assert_eq!(*u.data_ptr().add(4), 0);
        }
    }

    #[test]
    fn resize_preserves_prefix_and_reterminates() {
        let mut u = UniqueUnits::<u32>::try_new(10).unwrap();
        for (i, slot) in u.payload_mut().iter_mut().enumerate() {
            *slot = (i + 1) as u32;
        }
        u.set_len(10);
        u.resize(3).unwrap();
        assert_eq!(u.as_slice(), &[1, 2, 3]);
        unsafe {
            assert_eq!(*u.data_ptr().add(3), 0);
        }
        // Growing again exposes zeroed, not stale, storage.
        u.resize(6).unwrap();
        assert_eq!(u.as_slice(), &[1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn shared_resize_requires_unique_owner() {
        let mut u = UniqueUnits::<u16>::try_new(2).unwrap();
        u.set_len(2);
        let mut shared = u.into_shared();
        let alias = shared.clone();
        assert!(!shared.is_unique());
        assert!(shared.resize(1).is_err());
        drop(alias);
        assert!(shared.is_unique());
        shared.resize(1).unwrap();
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn builder_growth_and_shrink() {
        let mut b = UnitBuilder::<u16>::with_capacity(1).unwrap();
        for i in 0..100u16 {
            b.push(i).unwrap();
        }
        b.push_char(0x1F600).unwrap();
        assert_eq!(b.len(), 102);
        let shared = b.finish();
        assert_eq!(shared.len(), 102);
        assert_eq!(shared.cap(), 102);
        assert_eq!(&shared.as_slice()[100..], &[0xD83D, 0xDE00]);
    }

    #[test]
    fn builder_truncate_backs_off() {
        let mut b = UnitBuilder::<u32>::with_capacity(8).unwrap();
        b.push_units(&[1, 2, 3, 4]).unwrap();
        b.truncate(2);
        b.push(9).unwrap();
        assert_eq!(b.finish().as_slice(), &[1, 2, 9]);
    }

    #[test]
    fn overflowing_allocation_fails() {
        assert!(UniqueUnits::<u32>::try_new(usize::max_value() / 2).is_err());
    }
}
