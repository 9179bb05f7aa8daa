//! UTF-16 in both byte orders.
//!
//! `ByteOrder::Auto` consumes a leading BOM (FF FE or FE FF) and resolves
//! to that order for the remainder of the call, defaulting to the native
//! order when no BOM is present. An explicit order never consumes a BOM:
//! U+FEFF decodes as ordinary content.

use crate::buffer::UnitBuilder;
use crate::codecs::{ByteOrder, NATIVE_ORDER};
use crate::common::{combine_surrogates, is_high_surrogate, is_low_surrogate, Result};
use crate::errors::{DecodeErrors, EncodeErrors};
use crate::text::Str;
use crate::unit::CodeUnit;

#[inline]
fn read_u16(input: &[u8], pos: usize, order: ByteOrder) -> u16 {
    match order {
        ByteOrder::Be => u16::from_be_bytes([input[pos], input[pos + 1]]),
        _ => u16::from_le_bytes([input[pos], input[pos + 1]]),
    }
}

#[inline]
fn push_u16(v: u16, order: ByteOrder, out: &mut Vec<u8>) {
    let bytes = match order {
        ByteOrder::Be => v.to_be_bytes(),
        _ => v.to_le_bytes(),
    };
    out.extend_from_slice(&bytes);
}

pub fn decode_utf16<W: CodeUnit>(
    input: &[u8],
    errors: &str,
    order: ByteOrder,
    stream: bool,
) -> Result<(Str<W>, usize, ByteOrder)> {
    let mut pos = 0;
    let order = match order {
        ByteOrder::Auto => {
            if input.len() >= 2 && input[0] == 0xFF && input[1] == 0xFE {
                pos = 2;
                ByteOrder::Le
            } else if input.len() >= 2 && input[0] == 0xFE && input[1] == 0xFF {
                pos = 2;
                ByteOrder::Be
            } else if input.len() < 2 && stream {
                // Not enough bytes to settle the order yet.
                let out = UnitBuilder::with_capacity(0)?;
                return Ok((Str::from_builder(out), 0, ByteOrder::Auto));
            } else {
                NATIVE_ORDER
            }
        }
        explicit => explicit,
    };
    let mut out = UnitBuilder::with_capacity(input.len() / 2)?;
    let mut errs = DecodeErrors::new("utf-16", errors);
    while pos < input.len() {
        if pos + 2 > input.len() {
            if stream {
                break;
            }
            pos = errs.handle(&mut out, input, pos, input.len(), "truncated data")?;
            continue;
        }
        let unit = read_u16(input, pos, order);
        if is_high_surrogate(unit as u32) {
            if pos + 4 > input.len() {
                if stream {
                    break;
                }
                pos = errs.handle(&mut out, input, pos, input.len(), "unexpected end of data")?;
                continue;
            }
            let low = read_u16(input, pos + 2, order);
            if !is_low_surrogate(low as u32) {
                pos = errs.handle(&mut out, input, pos, pos + 2, "illegal UTF-16 surrogate")?;
                continue;
            }
            out.push_char(combine_surrogates(unit as u32, low as u32))?;
            pos += 4;
        } else if is_low_surrogate(unit as u32) {
            pos = errs.handle(&mut out, input, pos, pos + 2, "illegal UTF-16 surrogate")?;
        } else {
            out.push(W::from_u32(unit as u32))?;
            pos += 2;
        }
    }
    Ok((Str::from_builder(out), pos, order))
}

pub fn encode_utf16<W: CodeUnit>(s: &Str<W>, errors: &str, order: ByteOrder) -> Result<Vec<u8>> {
    let units = s.as_units();
    let mut out = Vec::with_capacity(units.len() * 2 + 2);
    let write_order = match order {
        ByteOrder::Auto => {
            push_u16(0xFEFF, NATIVE_ORDER, &mut out);
            NATIVE_ORDER
        }
        explicit => explicit,
    };
    let mut errs = EncodeErrors::new("utf-16", errors, units);
    let mut put = |cp: u32, out: &mut Vec<u8>| {
        if crate::common::is_surrogate(cp) {
            false
        } else if cp < 0x10000 {
            push_u16(cp as u16, write_order, out);
            true
        } else {
            let v = cp - 0x10000;
            push_u16(0xD800 + (v >> 10) as u16, write_order, out);
            push_u16(0xDC00 + (v & 0x3FF) as u16, write_order, out);
            true
        }
    };
    let mut ix = 0;
    while ix < units.len() {
        let (cp, n) = W::get_char(units, ix);
        if crate::common::is_surrogate(cp) {
            ix = errs.handle(&mut out, ix, ix + n, "surrogates not allowed", &mut put)?;
        } else if cp < 0x10000 {
            push_u16(cp as u16, write_order, &mut out);
            ix += n;
        } else {
            let v = cp - 0x10000;
            push_u16(0xD800 + (v >> 10) as u16, write_order, &mut out);
            push_u16(0xDC00 + (v & 0x3FF) as u16, write_order, &mut out);
            ix += n;
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

    #[test]
    fn bom_detection() {
        let (s, n, o) = decode_utf16::<u32>(b"\xff\xfeh\x00i\x00", "strict", ByteOrder::Auto, false).unwrap();
        assert_eq!((n, o), (6, ByteOrder::Le));
        assert_eq!(units(&s), vec![0x68, 0x69]);
        let (s, _, o) = decode_utf16::<u32>(b"\xfe\xff\x00h\x00i", "strict", ByteOrder::Auto, false).unwrap();
        assert_eq!(o, ByteOrder::Be);
        assert_eq!(units(&s), vec![0x68, 0x69]);
    }

    #[test]
    fn explicit_order_keeps_bom_as_content() {
        let (s, _, _) = decode_utf16::<u32>(b"\xfe\xff\x00h", "strict", ByteOrder::Be, false).unwrap();
        assert_eq!(units(&s), vec![0xFEFF, 0x68]);
    }

    #[test]
    fn surrogate_pairs() {
        // U+1F600 as LE pair D83D DE00.
        let bytes = b"\x3d\xd8\x00\xde";
        let (s, _, _) = decode_utf16::<u32>(bytes, "strict", ByteOrder::Le, false).unwrap();
        assert_eq!(units(&s), vec![0x1F600]);
        let (s, _, _) = decode_utf16::<u16>(bytes, "strict", ByteOrder::Le, false).unwrap();
        assert_eq!(s.as_units(), &[0xD83D, 0xDE00]);
    }

    #[test]
    fn lone_surrogates_error() {
        // High surrogate followed by a non-low unit.
        let bytes = b"\x3d\xd8\x41\x00";
        assert!(decode_utf16::<u32>(bytes, "strict", ByteOrder::Le, false).is_err());
        let (s, _, _) = decode_utf16::<u32>(bytes, "replace", ByteOrder::Le, false).unwrap();
        assert_eq!(units(&s), vec![0xFFFD, 0x41]);
        // A low surrogate with no preceding high.
        assert!(decode_utf16::<u32>(b"\x00\xdc", "strict", ByteOrder::Le, false).is_err());
    }

    #[test]
    fn streaming_backs_off() {
        // Odd trailing byte.
        let (s, n, _) = decode_utf16::<u32>(b"h\x00i", "strict", ByteOrder::Le, true).unwrap();
        assert_eq!(n, 2);
        assert_eq!(units(&s), vec![0x68]);
        // Unpaired trailing high surrogate waits for its partner.
        let (s, n, _) = decode_utf16::<u32>(b"h\x00\x3d\xd8", "strict", ByteOrder::Le, true).unwrap();
        assert_eq!(n, 2);
        assert_eq!(units(&s), vec![0x68]);
        // One-shot treats the same tail as an error.
        assert!(decode_utf16::<u32>(b"h\x00\x3d\xd8", "strict", ByteOrder::Le, false).is_err());
    }

    #[test]
    fn encode_bom_and_order() {
        let s = Str::<u32>::from_units(&[0x68]).unwrap();
        let auto = encode_utf16(&s, "strict", ByteOrder::Auto).unwrap();
        if NATIVE_ORDER == ByteOrder::Le {
            assert_eq!(auto, b"\xff\xfeh\x00");
        } else {
            assert_eq!(auto, b"\xfe\xff\x00h");
        }
        assert_eq!(encode_utf16(&s, "strict", ByteOrder::Le).unwrap(), b"h\x00");
        assert_eq!(encode_utf16(&s, "strict", ByteOrder::Be).unwrap(), b"\x00h");
    }

    #[test]
    fn encode_astral_and_lone_surrogate() {
        let s = Str::<u32>::from_units(&[0x1F600]).unwrap();
        assert_eq!(
            encode_utf16(&s, "strict", ByteOrder::Le).unwrap(),
            b"\x3d\xd8\x00\xde"
        );
        let lone = Str::<u16>::from_units(&[0x61, 0xDC00]).unwrap();
        assert!(encode_utf16(&lone, "strict", ByteOrder::Le).is_err());
        assert_eq!(
            encode_utf16(&lone, "ignore", ByteOrder::Le).unwrap(),
            b"a\x00"
        );
    }
}
