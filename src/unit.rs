//! The storage-width seam.
//!
//! Every codec in this crate is written once against [`CodeUnit`], which is
//! implemented exactly twice: for `u16` (narrow storage, where code points
//! above the Basic Multilingual Plane become UTF-16 surrogate pairs) and for
//! `u32` (wide storage, where every code point is a single unit). All
//! surrogate split/combine logic lives behind this trait so the state
//! machines never branch on the build width themselves.

use crate::buffer::UniqueUnits;
use crate::common::{combine_surrogates, is_high_surrogate, is_low_surrogate};
use crate::pool::UnitPool;

pub trait CodeUnit:
    Copy + Clone + Eq + Ord + std::hash::Hash + std::fmt::Debug + Default + 'static
{
    /// Width of a single unit in bits.
    const BITS: usize;

    fn from_u32(x: u32) -> Self;
    fn to_u32(self) -> u32;

    /// Units needed to store `cp`: 2 on narrow storage above the BMP.
    fn len_for_char(cp: u32) -> usize;

    /// Write `cp` starting at `out[0]`, returning the number of units
    /// written. Splits into a surrogate pair on narrow storage.
    fn put_char(cp: u32, out: &mut [Self]) -> usize;

    /// Read one code point at `ix`, combining a surrogate pair on narrow
    /// storage. Returns `(code point, units consumed)`. A lone surrogate
    /// reads as its raw ordinal.
    fn get_char(units: &[Self], ix: usize) -> (u32, usize);

    /// Run `f` against this width's thread-local buffer free list.
    fn with_pool<R>(f: impl FnOnce(&mut UnitPool<Self>) -> R) -> R;

    /// Best-effort keep-alive: offer a released buffer back to the free
    /// list. Deallocates if the list is unavailable (thread teardown) or
    /// full.
    fn reclaim(units: UniqueUnits<Self>);

    /// Run `f` against this width's canonical singleton table.
    fn with_singletons<R>(
        f: impl FnOnce(&mut crate::pool::Singletons<Self>) -> R,
    ) -> R;
}

impl CodeUnit for u16 {
    const BITS: usize = 16;

    #[inline]
    fn from_u32(x: u32) -> u16 {
        debug_assert!(x <= 0xFFFF);
        x as u16
    }

    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    fn len_for_char(cp: u32) -> usize {
        if cp >= 0x10000 {
            2
        } else {
            1
        }
    }

    #[inline]
    fn put_char(cp: u32, out: &mut [u16]) -> usize {
        if cp >= 0x10000 {
            let v = cp - 0x10000;
            out[0] = (0xD800 + (v >> 10)) as u16;
            out[1] = (0xDC00 + (v & 0x3FF)) as u16;
            2
        } else {
            out[0] = cp as u16;
            1
        }
    }

    #[inline]
    fn get_char(units: &[u16], ix: usize) -> (u32, usize) {
        let u = units[ix] as u32;
        if is_high_surrogate(u) && ix + 1 < units.len() {
            let lo = units[ix + 1] as u32;
            if is_low_surrogate(lo) {
                return (combine_surrogates(u, lo), 2);
            }
        }
        (u, 1)
    }

    fn with_pool<R>(f: impl FnOnce(&mut UnitPool<u16>) -> R) -> R {
        crate::pool::with_narrow_pool(f)
    }

    fn reclaim(units: UniqueUnits<u16>) {
        crate::pool::reclaim_narrow(units)
    }

    fn with_singletons<R>(f: impl FnOnce(&mut crate::pool::Singletons<u16>) -> R) -> R {
        crate::pool::with_narrow_singletons(f)
    }
}

impl CodeUnit for u32 {
    const BITS: usize = 32;

    #[inline]
    fn from_u32(x: u32) -> u32 {
        x
    }

    #[inline]
    fn to_u32(self) -> u32 {
        self
    }

    #[inline]
    fn len_for_char(_cp: u32) -> usize {
        1
    }

    #[inline]
    fn put_char(cp: u32, out: &mut [u32]) -> usize {
        out[0] = cp;
        1
    }

    #[inline]
    fn get_char(units: &[u32], ix: usize) -> (u32, usize) {
        (units[ix], 1)
    }

    fn with_pool<R>(f: impl FnOnce(&mut UnitPool<u32>) -> R) -> R {
        crate::pool::with_wide_pool(f)
    }

    fn reclaim(units: UniqueUnits<u32>) {
        crate::pool::reclaim_wide(units)
    }

    fn with_singletons<R>(f: impl FnOnce(&mut crate::pool::Singletons<u32>) -> R) -> R {
        crate::pool::with_wide_singletons(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_put_get() {
        let mut buf = [0u16; 2];
        assert_eq!(u16::put_char(0x41, &mut buf), 1);
        assert_eq!(buf[0], 0x41);
        assert_eq!(u16::put_char(0x1F600, &mut buf), 2);
        assert_eq!(buf, [0xD83D, 0xDE00]);
        assert_eq!(u16::get_char(&buf, 0), (0x1F600, 2));
        // A lone high surrogate reads as itself.
        assert_eq!(u16::get_char(&buf[..1], 0), (0xD83D, 1));
        // High surrogate followed by a non-low unit does not combine.
        let units = [0xD83Du16, 0x0041];
        assert_eq!(u16::get_char(&units, 0), (0xD83D, 1));
    }

    #[test]
    fn wide_put_get() {
        let mut buf = [0u32; 2];
        assert_eq!(u32::put_char(0x1F600, &mut buf), 1);
        assert_eq!(buf[0], 0x1F600);
        assert_eq!(u32::get_char(&buf, 0), (0x1F600, 1));
        assert_eq!(u32::len_for_char(0x1F600), 1);
        assert_eq!(u16::len_for_char(0x1F600), 2);
        assert_eq!(u16::len_for_char(0xFFFF), 1);
    }
}
