//! The string value.
//!
//! A [`Str`] is a cheap handle over a shared code-unit buffer, plus two
//! lazily computed caches: the hash, and the default-encoded (UTF-8) byte
//! form. Values are immutable after construction except for those caches
//! and the unique-owner [`resize`] path.
//!
//! [`resize`]: Str::resize

use crate::buffer::{UnitBuilder, Units};
use crate::common::{Result, MAX_CODE_POINT};
use crate::unit::CodeUnit;

use std::cell::{Cell, RefCell};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const HASH_UNSET: u64 = u64::max_value();

pub struct Str<W: CodeUnit> {
    units: Units<W>,
    hash: Cell<u64>,
    utf8: RefCell<Option<Rc<[u8]>>>,
}

impl<W: CodeUnit> Str<W> {
    pub(crate) fn from_shared(units: Units<W>) -> Str<W> {
        Str {
            units,
            hash: Cell::new(HASH_UNSET),
            utf8: RefCell::new(None),
        }
    }

    /// The canonical empty string (shared instance).
    pub fn empty() -> Str<W> {
        W::with_singletons(|s| s.empty())
    }

    /// Freeze a builder into a value, routing zero-length and
    /// single-Latin-1-character results through the canonical singletons.
    pub(crate) fn from_builder(b: UnitBuilder<W>) -> Str<W> {
        match b.as_slice() {
            [] => Str::empty(),
            [u] if u.to_u32() < 0x100 => {
                let b0 = u.to_u32() as u8;
                W::with_singletons(|s| s.latin1(b0))
            }
            _ => Str::from_shared(b.finish()),
        }
    }

    pub fn from_units(units: &[W]) -> Result<Str<W>> {
        match units {
            [] => Ok(Str::empty()),
            [u] if u.to_u32() < 0x100 => {
                let b = u.to_u32() as u8;
                Ok(W::with_singletons(|s| s.latin1(b)))
            }
            _ => {
                let mut b = UnitBuilder::with_capacity(units.len())?;
                b.push_units(units)?;
                Ok(Str::from_shared(b.finish()))
            }
        }
    }

    /// A one-code-point string.
    pub fn from_char(cp: u32) -> Result<Str<W>> {
        if cp > MAX_CODE_POINT {
            return err!("character U+{:X} not in range(0x110000)", cp);
        }
        if cp < 0x100 {
            return Ok(W::with_singletons(|s| s.latin1(cp as u8)));
        }
        let mut b = UnitBuilder::with_capacity(W::len_for_char(cp))?;
        b.push_char(cp)?;
        Ok(Str::from_shared(b.finish()))
    }

    /// Strict UTF-8 decode.
    pub fn from_bytes_utf8(bytes: &[u8]) -> Result<Str<W>> {
        let (s, _) = crate::codecs::utf8::decode_utf8(bytes, "strict", false)?;
        Ok(s)
    }

    /// Decode with the process default encoding (strict).
    pub fn from_bytes(bytes: &[u8]) -> Result<Str<W>> {
        let enc = crate::codecs::default_encoding();
        crate::codecs::decode(bytes, &enc, "strict")
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.len() == 0
    }

    /// Read-only view of the code units.
    pub fn as_units(&self) -> &[W] {
        self.units.as_slice()
    }

    /// Iterate code points, combining surrogate pairs on narrow storage.
    pub fn chars(&self) -> CodePoints<W> {
        CodePoints {
            units: self.units.as_slice(),
            ix: 0,
        }
    }

    /// Whether two handles share one buffer. Canonical singletons compare
    /// identical under this check.
    pub fn ptr_eq(&self, other: &Str<W>) -> bool {
        self.units.as_ptr() == other.units.as_ptr()
    }

    /// In-place resize; valid only while this handle is the unique owner of
    /// the buffer. Preserves `min(len, new_len)` units, re-terminates, and
    /// invalidates the cached hash and cached byte form.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        self.units.resize(new_len)?;
        self.hash.set(HASH_UNSET);
        self.utf8.replace(None);
        Ok(())
    }

    /// The cached default-encoded byte form (strict UTF-8), computed on
    /// first use.
    pub fn to_utf8(&self) -> Result<Rc<[u8]>> {
        if let Some(cached) = self.utf8.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let bytes: Rc<[u8]> =
            crate::codecs::utf8::encode_utf8(self, "strict")?.into();
        self.utf8.replace(Some(bytes.clone()));
        Ok(bytes)
    }

    fn cached_hash(&self) -> u64 {
        let mut h = self.hash.get();
        if h == HASH_UNSET {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            for u in self.units.as_slice() {
                hasher.write_u32(u.to_u32());
            }
            h = hasher.finish();
            if h == HASH_UNSET {
                h = 0;
            }
            self.hash.set(h);
        }
        h
    }
}

impl<W: CodeUnit> Clone for Str<W> {
    fn clone(&self) -> Str<W> {
        Str {
            units: self.units.clone(),
            hash: Cell::new(self.hash.get()),
            utf8: RefCell::new(self.utf8.borrow().clone()),
        }
    }
}

impl<W: CodeUnit> Default for Str<W> {
    fn default() -> Str<W> {
        Str::empty()
    }
}

impl<W: CodeUnit> PartialEq for Str<W> {
    fn eq(&self, other: &Str<W>) -> bool {
        // Same buffer means equal without looking at content.
        self.ptr_eq(other) || self.as_units() == other.as_units()
    }
}

impl<W: CodeUnit> Eq for Str<W> {}

impl<W: CodeUnit> Hash for Str<W> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cached_hash())
    }
}

pub struct CodePoints<'a, W: CodeUnit> {
    units: &'a [W],
    ix: usize,
}

impl<'a, W: CodeUnit> Iterator for CodePoints<'a, W> {
    type Item = u32;
    fn next(&mut self) -> Option<u32> {
        if self.ix >= self.units.len() {
            return None;
        }
        let (cp, n) = W::get_char(self.units, self.ix);
        self.ix += n;
        Some(cp)
    }
}

mod formatting {
    use super::*;
    use std::fmt::{self, Debug, Display, Formatter};

    impl<W: CodeUnit> Display for Str<W> {
        fn fmt(&self, f: &mut Formatter) -> fmt::Result {
            for cp in self.chars() {
                // Lone surrogates render as the replacement character.
                let c = std::char::from_u32(cp).unwrap_or('\u{FFFD}');
                write!(f, "{}", c)?;
            }
            Ok(())
        }
    }

    impl<W: CodeUnit> Debug for Str<W> {
        fn fmt(&self, f: &mut Formatter) -> fmt::Result {
            write!(f, "Str(len={}, units=[", self.len())?;
            for (i, u) in self.as_units().iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:04X}", u.to_u32())?;
            }
            write!(f, "])/[disp=<{}>]", self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_singleton() {
        let a = Str::<u16>::from_units(&[]).unwrap();
        let b = Str::<u16>::empty();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.len(), 0);
    }

    #[test]
    fn latin1_singletons() {
        let a = Str::<u32>::from_units(&[0x41]).unwrap();
        let b = Str::<u32>::from_char(0x41).unwrap();
        assert!(a.ptr_eq(&b));
        // Above Latin-1 allocates fresh values.
        let c = Str::<u32>::from_char(0x100).unwrap();
        let d = Str::<u32>::from_char(0x100).unwrap();
        assert!(!c.ptr_eq(&d));
        assert_eq!(c, d);
    }

    #[test]
    fn from_char_narrow_splits() {
        let s = Str::<u16>::from_char(0x1F600).unwrap();
        assert_eq!(s.as_units(), &[0xD83D, 0xDE00]);
        assert_eq!(s.chars().collect::<Vec<_>>(), vec![0x1F600]);
        let w = Str::<u32>::from_char(0x1F600).unwrap();
        assert_eq!(w.as_units(), &[0x1F600]);
    }

    #[test]
    fn resize_discipline() {
        // Resizing the canonical empty string fails: it is shared.
        let mut e = Str::<u16>::empty();
        assert!(e.resize(4).is_err());

        let mut s = Str::<u16>::from_units(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap();
        s.resize(3).unwrap();
        assert_eq!(s.as_units(), &[1, 2, 3]);

        // A shared (cloned) value cannot be resized either.
        let alias = s.clone();
        assert!(s.resize(2).is_err());
        drop(alias);
        s.resize(2).unwrap();
        assert_eq!(s.as_units(), &[1, 2]);
    }

    #[test]
    fn hash_cached_and_stable() {
        let s = Str::<u32>::from_units(&[0x68, 0x69, 0x21, 0x2764]).unwrap();
        let h1 = s.cached_hash();
        let h2 = s.cached_hash();
        assert_eq!(h1, h2);
        let t = Str::<u32>::from_units(&[0x68, 0x69, 0x21, 0x2764]).unwrap();
        assert_eq!(t.cached_hash(), h1);
    }

    #[test]
    fn resize_invalidates_caches() {
        let mut s = Str::<u32>::from_units(&[0x61, 0x62, 0x63]).unwrap();
        let h = s.cached_hash();
        let enc = s.to_utf8().unwrap();
        assert_eq!(&*enc, b"abc");
        s.resize(2).unwrap();
        assert_eq!(&*s.to_utf8().unwrap(), b"ab");
        assert_ne!(s.cached_hash(), h);
    }

    #[test]
    fn display_lossy() {
        let s = Str::<u16>::from_units(&[0x68, 0xD83D, 0xDE00]).unwrap();
        assert_eq!(format!("{}", s), "h\u{1F600}");
        let lone = Str::<u16>::from_units(&[0x68, 0xD83D]).unwrap();
        assert_eq!(format!("{}", lone), "h\u{FFFD}");
    }
}
