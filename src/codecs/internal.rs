//! The internal-representation codec: code units dumped as native-endian
//! bytes, one chunk per unit. The chunk width follows the storage width, so
//! the byte form is only meaningful to a peer built with the same width and
//! endianness.

use crate::buffer::UnitBuilder;
use crate::common::{Result, MAX_CODE_POINT};
use crate::errors::DecodeErrors;
use crate::text::Str;
use crate::unit::CodeUnit;

pub fn decode_internal<W: CodeUnit>(
    input: &[u8],
    errors: &str,
    stream: bool,
) -> Result<(Str<W>, usize)> {
    let width = std::mem::size_of::<W>();
    let mut out = UnitBuilder::with_capacity(input.len() / width)?;
    let mut errs = DecodeErrors::new("unicode-internal", errors);
    let mut pos = 0;
    while pos < input.len() {
        if pos + width > input.len() {
            if stream {
                break;
            }
            pos = errs.handle(&mut out, input, pos, input.len(), "truncated data")?;
            continue;
        }
        let v = match width {
            2 => u16::from_ne_bytes([input[pos], input[pos + 1]]) as u32,
            _ => u32::from_ne_bytes([
                input[pos],
                input[pos + 1],
                input[pos + 2],
                input[pos + 3],
            ]),
        };
        if v > MAX_CODE_POINT {
            pos = errs.handle(
                &mut out,
                input,
                pos,
                pos + width,
                "code point not in range(0x110000)",
            )?;
            continue;
        }
        // Units transfer verbatim; surrogate halves included.
        out.push(W::from_u32(v))?;
        pos += width;
    }
    Ok((Str::from_builder(out), pos))
}

pub fn encode_internal<W: CodeUnit>(s: &Str<W>) -> Result<Vec<u8>> {
    let width = std::mem::size_of::<W>();
    let units = s.as_units();
    let mut out = Vec::with_capacity(units.len() * width);
    for u in units {
        let v = u.to_u32();
        match width {
            2 => out.extend_from_slice(&(v as u16).to_ne_bytes()),
            _ => out.extend_from_slice(&v.to_ne_bytes()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_both_widths() {
        let narrow = Str::<u16>::from_units(&[0x68, 0xD83D, 0xDE00]).unwrap();
        let bytes = encode_internal(&narrow).unwrap();
        assert_eq!(bytes.len(), 6);
        let (back, n) = decode_internal::<u16>(&bytes, "strict", false).unwrap();
        assert_eq!(n, 6);
        assert_eq!(back.as_units(), narrow.as_units());

        let wide = Str::<u32>::from_units(&[0x68, 0x1F600]).unwrap();
        let bytes = encode_internal(&wide).unwrap();
        assert_eq!(bytes.len(), 8);
        let (back, _) = decode_internal::<u32>(&bytes, "strict", false).unwrap();
        assert_eq!(back.as_units(), wide.as_units());
    }

    #[test]
    fn truncated_tail() {
        let bytes = encode_internal(&Str::<u32>::from_units(&[0x41, 0x42]).unwrap()).unwrap();
        assert!(decode_internal::<u32>(&bytes[..5], "strict", false).is_err());
        let (s, n) = decode_internal::<u32>(&bytes[..5], "strict", true).unwrap();
        assert_eq!(n, 4);
        assert_eq!(s.as_units(), &[0x41]);
    }

    #[test]
    fn out_of_range_wide_unit() {
        let bytes = 0x0011_0000u32.to_ne_bytes();
        assert!(decode_internal::<u32>(&bytes, "strict", false).is_err());
        let (s, _) = decode_internal::<u32>(&bytes, "replace", false).unwrap();
        assert_eq!(s.as_units(), &[0xFFFD]);
    }
}
