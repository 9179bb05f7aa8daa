//! Table-driven single-byte codecs.
//!
//! A decode map sends each byte to an ordinal (or nowhere); an encode map
//! is the inverse, sending an ordinal to an output byte sequence. Maps are
//! expressed over ordinals so one table serves both storage widths. Passing
//! no map at all means Latin-1 in both directions.

use crate::buffer::UnitBuilder;
use crate::common::{Result, MAX_CODE_POINT};
use crate::errors::{DecodeErrors, EncodeErrors};
use crate::text::Str;
use crate::unit::CodeUnit;

use hashbrown::HashMap;

// Dense tables mark holes with a sentinel that is not a valid mapping
// target (U+FFFE is a noncharacter).
const UNMAPPED: u32 = 0xFFFE;

pub enum DecodeMap {
    Dense(Box<[u32; 256]>),
    Sparse(HashMap<u8, u32>),
}

impl DecodeMap {
    /// Build a dense map from a table indexed by byte value. Entries past
    /// the table's length and U+FFFE are holes; out-of-range entries are a
    /// configuration error, rejected before any decoding happens.
    pub fn from_table(table: &[u32]) -> Result<DecodeMap> {
        if table.len() > 256 {
            return err!("charmap table has {} entries, at most 256 allowed", table.len());
        }
        let mut dense = Box::new([UNMAPPED; 256]);
        for (b, &cp) in table.iter().enumerate() {
            if cp > MAX_CODE_POINT {
                return err!("charmap entry U+{:X} out of range", cp);
            }
            if cp != UNMAPPED {
                dense[b] = cp;
            }
        }
        Ok(DecodeMap::Dense(dense))
    }

    pub fn from_pairs(pairs: &[(u8, u32)]) -> Result<DecodeMap> {
        let mut map = HashMap::with_capacity(pairs.len());
        for &(b, cp) in pairs {
            if cp > MAX_CODE_POINT {
                return err!("charmap entry U+{:X} out of range", cp);
            }
            map.insert(b, cp);
        }
        Ok(DecodeMap::Sparse(map))
    }

    fn lookup(&self, b: u8) -> Option<u32> {
        match self {
            DecodeMap::Dense(table) => {
                let cp = table[b as usize];
                if cp == UNMAPPED {
                    None
                } else {
                    Some(cp)
                }
            }
            DecodeMap::Sparse(map) => map.get(&b).copied(),
        }
    }
}

pub fn decode_charmap<W: CodeUnit>(
    input: &[u8],
    errors: &str,
    map: Option<&DecodeMap>,
) -> Result<(Str<W>, usize)> {
    let map = match map {
        Some(m) => m,
        None => return super::ascii::decode_latin1(input),
    };
    let mut out = UnitBuilder::with_capacity(input.len())?;
    let mut errs = DecodeErrors::new("charmap", errors);
    let mut pos = 0;
    while pos < input.len() {
        match map.lookup(input[pos]) {
            Some(cp) => {
                out.push_char(cp)?;
                pos += 1;
            }
            None => {
                pos = errs.handle(&mut out, input, pos, pos + 1, "character maps to <undefined>")?;
            }
        }
    }
    Ok((Str::from_builder(out), pos))
}

pub struct EncodeMap {
    map: HashMap<u32, Vec<u8>>,
}

impl EncodeMap {
    pub fn new() -> EncodeMap {
        EncodeMap {
            map: HashMap::new(),
        }
    }

    /// The inverse of a decode map. When several bytes decode to the same
    /// ordinal the lowest byte wins.
    pub fn from_decode_map(map: &DecodeMap) -> EncodeMap {
        let mut enc = EncodeMap::new();
        let mut add = |b: u8, cp: u32| {
            enc.map.entry(cp).or_insert_with(|| vec![b]);
        };
        match map {
            DecodeMap::Dense(table) => {
                for (b, &cp) in table.iter().enumerate() {
                    if cp != UNMAPPED {
                        add(b as u8, cp);
                    }
                }
            }
            DecodeMap::Sparse(sparse) => {
                let mut pairs: Vec<_> = sparse.iter().map(|(b, cp)| (*b, *cp)).collect();
                pairs.sort();
                for (b, cp) in pairs {
                    add(b, cp);
                }
            }
        }
        enc
    }

    pub fn insert(&mut self, cp: u32, bytes: Vec<u8>) {
        self.map.insert(cp, bytes);
    }

    fn lookup(&self, cp: u32) -> Option<&[u8]> {
        self.map.get(&cp).map(|v| v.as_slice())
    }
}

impl Default for EncodeMap {
    fn default() -> EncodeMap {
        EncodeMap::new()
    }
}

pub fn encode_charmap<W: CodeUnit>(
    s: &Str<W>,
    errors: &str,
    map: Option<&EncodeMap>,
) -> Result<Vec<u8>> {
    let map = match map {
        Some(m) => m,
        None => return super::ascii::encode_latin1(s, errors),
    };
    let units = s.as_units();
    let mut out = Vec::with_capacity(units.len());
    let mut errs = EncodeErrors::new("charmap", errors, units);
    let mut put = |cp: u32, out: &mut Vec<u8>| match map.lookup(cp) {
        Some(bytes) => {
            out.extend_from_slice(bytes);
            true
        }
        None => false,
    };
    let mut ix = 0;
    while ix < units.len() {
        let (cp, n) = W::get_char(units, ix);
        match map.lookup(cp) {
            Some(bytes) => {
                out.extend_from_slice(bytes);
                ix += n;
            }
            None => {
                ix = errs.handle(&mut out, ix, ix + n, "character maps to <undefined>", &mut put)?;
            }
        }
    }
    out.shrink_to_fit();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units<W: CodeUnit>(s: &Str<W>) -> Vec<u32> {
        s.as_units().iter().map(|u| u.to_u32()).collect()
    }

    // A toy 4-entry map: 0->'a', 1->U+263A, 2 is a hole, 3->U+1F600.
    fn toy_map() -> DecodeMap {
        DecodeMap::from_table(&[0x61, 0x263A, UNMAPPED, 0x1F600]).unwrap()
    }

    #[test]
    fn dense_decode() {
        let map = toy_map();
        let (s, _) = decode_charmap::<u32>(&[0, 1, 3], "strict", Some(&map)).unwrap();
        assert_eq!(units(&s), vec![0x61, 0x263A, 0x1F600]);
        // Narrow storage splits astral targets.
        let (s, _) = decode_charmap::<u16>(&[3], "strict", Some(&map)).unwrap();
        assert_eq!(s.as_units(), &[0xD83D, 0xDE00]);
    }

    #[test]
    fn holes_go_through_handler() {
        let map = toy_map();
        assert!(decode_charmap::<u32>(&[0, 2], "strict", Some(&map)).is_err());
        let (s, _) = decode_charmap::<u32>(&[0, 2], "replace", Some(&map)).unwrap();
        assert_eq!(units(&s), vec![0x61, 0xFFFD]);
        let (s, _) = decode_charmap::<u32>(&[0, 255], "ignore", Some(&map)).unwrap();
        assert_eq!(units(&s), vec![0x61]);
    }

    #[test]
    fn out_of_range_entries_are_rejected_up_front() {
        // Both constructors refuse entries past the code-point ceiling;
        // only U+FFFE is a hole in the dense form.
        assert!(DecodeMap::from_table(&[0x61, 0x110000]).is_err());
        assert!(DecodeMap::from_pairs(&[(0, 0x110000)]).is_err());
        let map = DecodeMap::from_table(&[UNMAPPED]).unwrap();
        assert!(decode_charmap::<u32>(&[0], "strict", Some(&map)).is_err());
    }

    #[test]
    fn sparse_decode() {
        let map = DecodeMap::from_pairs(&[(0x80, 0x20AC)]).unwrap();
        let (s, _) = decode_charmap::<u32>(&[0x80], "strict", Some(&map)).unwrap();
        assert_eq!(units(&s), vec![0x20AC]);
        assert!(decode_charmap::<u32>(&[0x81], "strict", Some(&map)).is_err());
    }

    #[test]
    fn no_map_is_latin1() {
        let (s, _) = decode_charmap::<u32>(b"a\xe9", "strict", None).unwrap();
        assert_eq!(units(&s), vec![0x61, 0xE9]);
        assert_eq!(
            encode_charmap(&s, "strict", None).unwrap(),
            b"a\xe9"
        );
    }

    #[test]
    fn encode_inverse_round_trip() {
        let dec = toy_map();
        let enc = EncodeMap::from_decode_map(&dec);
        let (s, _) = decode_charmap::<u16>(&[0, 1, 3], "strict", Some(&dec)).unwrap();
        assert_eq!(encode_charmap(&s, "strict", Some(&enc)).unwrap(), &[0, 1, 3]);
        // Unmapped ordinals route through the handler; the narrow pair is
        // one error span.
        let t = Str::<u16>::from_units(&[0x61]).unwrap();
        assert!(encode_charmap(&t, "strict", Some(&enc)).unwrap() == vec![0]);
        let missing = Str::<u16>::from_units(&[0x62]).unwrap();
        assert!(encode_charmap(&missing, "strict", Some(&enc)).is_err());
        // "replace" needs '?' itself to be mapped.
        assert!(encode_charmap(&missing, "replace", Some(&enc)).is_err());
        let mut with_question = EncodeMap::from_decode_map(&dec);
        with_question.insert(b'?' as u32, vec![b'?']);
        assert_eq!(
            encode_charmap(&missing, "replace", Some(&with_question)).unwrap(),
            b"?"
        );
    }

    #[test]
    fn multi_byte_encode_targets() {
        let mut enc = EncodeMap::new();
        enc.insert(0x153, b"oe".to_vec());
        let s = Str::<u32>::from_units(&[0x153]).unwrap();
        assert_eq!(encode_charmap(&s, "strict", Some(&enc)).unwrap(), b"oe");
    }
}
