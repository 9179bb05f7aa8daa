//! ASCII and Latin-1: the 1:1 byte codecs.
//!
//! ASCII rejects bytes >= 0x80 through the error handler; Latin-1 is total
//! in the decode direction and never errors.

use crate::buffer::UnitBuilder;
use crate::common::Result;
use crate::errors::{DecodeErrors, EncodeErrors};
use crate::text::Str;
use crate::unit::CodeUnit;

pub fn decode_ascii<W: CodeUnit>(input: &[u8], errors: &str) -> Result<(Str<W>, usize)> {
    let mut out = UnitBuilder::with_capacity(input.len())?;
    let mut errs = DecodeErrors::new("ascii", errors);
    let mut pos = 0;
    while pos < input.len() {
        let b = input[pos];
        if b < 0x80 {
            out.push(W::from_u32(b as u32))?;
            pos += 1;
        } else {
            pos = errs.handle(&mut out, input, pos, pos + 1, "ordinal not in range(128)")?;
        }
    }
    Ok((Str::from_builder(out), input.len()))
}

pub fn decode_latin1<W: CodeUnit>(input: &[u8]) -> Result<(Str<W>, usize)> {
    let mut out = UnitBuilder::with_capacity(input.len())?;
    for b in input {
        out.push(W::from_u32(*b as u32))?;
    }
    Ok((Str::from_builder(out), input.len()))
}

fn encode_bounded<W: CodeUnit>(
    s: &Str<W>,
    errors: &str,
    encoding: &'static str,
    limit: u32,
    reason: &'static str,
) -> Result<Vec<u8>> {
    let units = s.as_units();
    let mut out = Vec::with_capacity(units.len());
    let mut errs = EncodeErrors::new(encoding, errors, units);
    let mut put = move |cp: u32, out: &mut Vec<u8>| {
        if cp < limit {
            out.push(cp as u8);
            true
        } else {
            false
        }
    };
    let mut ix = 0;
    while ix < units.len() {
        let (cp, n) = W::get_char(units, ix);
        if cp < limit {
            out.push(cp as u8);
            ix += n;
        } else {
            ix = errs.handle(&mut out, ix, ix + n, reason, &mut put)?;
        }
    }
    out.shrink_to_fit();
    Ok(out)
}

pub fn encode_ascii<W: CodeUnit>(s: &Str<W>, errors: &str) -> Result<Vec<u8>> {
    encode_bounded(s, errors, "ascii", 0x80, "ordinal not in range(128)")
}

pub fn encode_latin1<W: CodeUnit>(s: &Str<W>, errors: &str) -> Result<Vec<u8>> {
    encode_bounded(s, errors, "latin-1", 0x100, "ordinal not in range(256)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_policies() {
        assert!(decode_ascii::<u16>(b"ok\xff", "strict").is_err());
        let (s, _) = decode_ascii::<u16>(b"ok\xff", "ignore").unwrap();
        assert_eq!(s.as_units(), &[b'o' as u16, b'k' as u16]);
        let (s, _) = decode_ascii::<u16>(b"\xff", "replace").unwrap();
        assert_eq!(s.as_units(), &[0xFFFD]);
    }

    #[test]
    fn latin1_total() {
        let (s, n) = decode_latin1::<u32>(b"\x00a\xe9\xff").unwrap();
        assert_eq!(n, 4);
        assert_eq!(s.as_units(), &[0x00, 0x61, 0xE9, 0xFF]);
    }

    #[test]
    fn single_char_decodes_hit_singletons() {
        let (a, _) = decode_ascii::<u16>(b"x", "strict").unwrap();
        let (b, _) = decode_latin1::<u16>(b"x").unwrap();
        assert!(a.ptr_eq(&b));
        let (e1, _) = decode_ascii::<u16>(b"", "strict").unwrap();
        let (e2, _) = decode_latin1::<u16>(b"").unwrap();
        assert!(e1.ptr_eq(&e2));
    }

    #[test]
    fn encode_policies() {
        let s = Str::<u32>::from_units(&[0x61, 0x2764, 0x62]).unwrap();
        assert!(encode_ascii(&s, "strict").is_err());
        assert_eq!(encode_ascii(&s, "ignore").unwrap(), b"ab");
        assert_eq!(encode_ascii(&s, "replace").unwrap(), b"a?b");
        assert_eq!(encode_ascii(&s, "xmlcharrefreplace").unwrap(), b"a&#10084;b");
        let l = Str::<u32>::from_units(&[0x61, 0xE9]).unwrap();
        assert_eq!(encode_latin1(&l, "strict").unwrap(), b"a\xe9");
        assert!(encode_ascii(&l, "strict").is_err());
    }

    #[test]
    fn encode_xml_narrow_pair_is_one_reference() {
        let s = Str::<u16>::from_units(&[0xD83D, 0xDE00]).unwrap();
        assert_eq!(encode_ascii(&s, "xmlcharrefreplace").unwrap(), b"&#128512;");
    }
}
