//! UTF-7 (RFC 2152).
//!
//! Bytes outside the base64 sections pass through as ASCII. A `+` opens a
//! base64 section encoding a run of UTF-16 code units in 6-bit groups; a
//! `-` closes the section and is absorbed, any other non-base64 byte closes
//! it and is reprocessed as plain content. `+-` is the escape for a literal
//! `+`. Surrogate pairs inside a section recombine before storage.

use crate::buffer::UnitBuilder;
use crate::common::{combine_surrogates, is_high_surrogate, is_low_surrogate, Result};
use crate::errors::DecodeErrors;
use crate::text::Str;
use crate::unit::CodeUnit;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[inline]
fn base64_value(b: u8) -> Option<u32> {
    match b {
        b'A'..=b'Z' => Some((b - b'A') as u32),
        b'a'..=b'z' => Some((b - b'a' + 26) as u32),
        b'0'..=b'9' => Some((b - b'0' + 52) as u32),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

// Characters that encode as themselves. RFC 2152 set D plus the common
// whitespace, matching what most producers emit.
#[inline]
fn is_direct(cp: u32) -> bool {
    match cp {
        0x41..=0x5A | 0x61..=0x7A | 0x30..=0x39 => true,
        _ => matches!(
            cp as u8 as char,
            '\'' | '(' | ')' | ',' | '-' | '.' | '/' | ':' | '?' | ' ' | '\t' | '\r' | '\n'
        ) && cp < 0x80,
    }
}

fn emit_unit<W: CodeUnit>(
    unit: u32,
    pending_high: &mut Option<u32>,
    out: &mut UnitBuilder<W>,
) -> Result<()> {
    if let Some(hi) = pending_high.take() {
        if is_low_surrogate(unit) {
            return out.push_char(combine_surrogates(hi, unit));
        }
        // The high surrogate stays lone.
        out.push_char(hi)?;
    }
    if is_high_surrogate(unit) {
        *pending_high = Some(unit);
        Ok(())
    } else {
        out.push_char(unit)
    }
}

pub fn decode_utf7<W: CodeUnit>(
    input: &[u8],
    errors: &str,
    stream: bool,
) -> Result<(Str<W>, usize)> {
    let mut out = UnitBuilder::with_capacity(input.len())?;
    let mut errs = DecodeErrors::new("utf-7", errors);
    let mut pos = 0;
    while pos < input.len() {
        let b = input[pos];
        if b == b'+' {
            let shift_start = pos;
            let out_start = out.len();
            pos += 1;
            let mut bits: u32 = 0;
            let mut nbits: u32 = 0;
            let mut pending_high: Option<u32> = None;
            let mut wrote = false;
            loop {
                if pos >= input.len() {
                    if stream {
                        // Back off to the section start; the caller retries
                        // once more bytes arrive.
                        out.truncate(out_start);
                        return Ok((Str::from_builder(out), shift_start));
                    }
                    if pending_high.is_some() || nbits >= 6 {
                        pos = errs.handle(
                            &mut out,
                            input,
                            shift_start,
                            input.len(),
                            "unterminated shift sequence",
                        )?;
                    } else if nbits > 0 && bits & ((1 << nbits) - 1) != 0 {
                        pos = errs.handle(
                            &mut out,
                            input,
                            shift_start,
                            input.len(),
                            "partial character in shift sequence",
                        )?;
                    }
                    break;
                }
                let c = input[pos];
                if let Some(v) = base64_value(c) {
                    pos += 1;
                    wrote = true;
                    bits = (bits << 6) | v;
                    nbits += 6;
                    if nbits >= 16 {
                        nbits -= 16;
                        emit_unit((bits >> nbits) & 0xFFFF, &mut pending_high, &mut out)?;
                    }
                    continue;
                }
                // Section terminator.
                if nbits >= 6 {
                    pos = errs.handle(
                        &mut out,
                        input,
                        shift_start,
                        pos,
                        "partial character in shift sequence",
                    )?;
                    break;
                }
                if nbits > 0 && bits & ((1 << nbits) - 1) != 0 {
                    pos = errs.handle(
                        &mut out,
                        input,
                        shift_start,
                        pos,
                        "non-zero padding bits in shift sequence",
                    )?;
                    break;
                }
                if let Some(hi) = pending_high.take() {
                    out.push_char(hi)?;
                }
                if c == b'-' {
                    pos += 1;
                    if !wrote {
                        // "+-" is the literal plus sign.
                        out.push(W::from_u32('+' as u32))?;
                    }
                }
                break;
            }
        } else if b < 0x80 {
            out.push(W::from_u32(b as u32))?;
            pos += 1;
        } else {
            pos = errs.handle(&mut out, input, pos, pos + 1, "unexpected special character")?;
        }
    }
    Ok((Str::from_builder(out), pos))
}

pub fn encode_utf7<W: CodeUnit>(s: &Str<W>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    let mut bits: u32 = 0;
    let mut nbits: u32 = 0;
    let mut in_shift = false;

    let flush = |bits: &mut u32, nbits: &mut u32, out: &mut Vec<u8>| {
        if *nbits > 0 {
            out.push(BASE64[((*bits << (6 - *nbits)) & 0x3F) as usize]);
            *bits = 0;
            *nbits = 0;
        }
    };
    let mut push_unit = |unit: u32, bits: &mut u32, nbits: &mut u32, out: &mut Vec<u8>| {
        *bits = (*bits << 16) | unit;
        *nbits += 16;
        while *nbits >= 6 {
            *nbits -= 6;
            out.push(BASE64[((*bits >> *nbits) & 0x3F) as usize]);
        }
    };

    for cp in s.chars() {
        if is_direct(cp) {
            if in_shift {
                flush(&mut bits, &mut nbits, &mut out);
                out.push(b'-');
                in_shift = false;
            }
            out.push(cp as u8);
        } else if cp == '+' as u32 {
            if in_shift {
                flush(&mut bits, &mut nbits, &mut out);
                out.push(b'-');
                in_shift = false;
            }
            out.extend_from_slice(b"+-");
        } else {
            if !in_shift {
                out.push(b'+');
                in_shift = true;
            }
            if cp < 0x10000 {
                push_unit(cp, &mut bits, &mut nbits, &mut out);
            } else {
                let v = cp - 0x10000;
                push_unit(0xD800 + (v >> 10), &mut bits, &mut nbits, &mut out);
                push_unit(0xDC00 + (v & 0x3FF), &mut bits, &mut nbits, &mut out);
            }
        }
    }
    if in_shift {
        flush(&mut bits, &mut nbits, &mut out);
        out.push(b'-');
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
    fn plain_ascii_passes_through() {
        let (s, n) = decode_utf7::<u32>(b"Hello, World?", "strict", false).unwrap();
        assert_eq!(n, 13);
        assert_eq!(format!("{}", s), "Hello, World?");
    }

    #[test]
    fn literal_plus() {
        let (s, _) = decode_utf7::<u32>(b"a+-b", "strict", false).unwrap();
        assert_eq!(units(&s), vec![0x61, 0x2B, 0x62]);
        let back = encode_utf7(&s).unwrap();
        assert_eq!(back, b"a+-b");
    }

    #[test]
    fn base64_section() {
        // "Hi Mom -+Jjo--!" from RFC 2152: +Jjo- is U+263A.
        let (s, _) = decode_utf7::<u32>(b"Hi Mom -+Jjo--!", "strict", false).unwrap();
        assert_eq!(format!("{}", s), "Hi Mom -\u{263A}-!");
    }

    #[test]
    fn astral_pairs_recombine() {
        let s = Str::<u32>::from_units(&[0x1F600]).unwrap();
        let bytes = encode_utf7(&s).unwrap();
        let (back, _) = decode_utf7::<u32>(&bytes, "strict", false).unwrap();
        assert_eq!(units(&back), vec![0x1F600]);
        let (narrow, _) = decode_utf7::<u16>(&bytes, "strict", false).unwrap();
        assert_eq!(narrow.as_units(), &[0xD83D, 0xDE00]);
    }

    #[test]
    fn terminator_variants() {
        // Non-base64 byte ends the section and stays in the output.
        let (s, _) = decode_utf7::<u32>(b"+Jjo.", "strict", false).unwrap();
        assert_eq!(units(&s), vec![0x263A, 0x2E]);
        // Explicit '-' terminator is absorbed.
        let (s, _) = decode_utf7::<u32>(b"+Jjo-.", "strict", false).unwrap();
        assert_eq!(units(&s), vec![0x263A, 0x2E]);
    }

    #[test]
    fn padding_errors() {
        // Leftover nonzero bits.
        assert!(decode_utf7::<u32>(b"+JjoX-", "strict", false).is_err());
        let (s, _) = decode_utf7::<u32>(b"+JjoX-", "replace", false).unwrap();
        assert!(units(&s).contains(&0xFFFD));
        // High bytes outside a section are errors.
        assert!(decode_utf7::<u32>(b"\xff", "strict", false).is_err());
    }

    #[test]
    fn streaming_backs_off_open_section() {
        let (s, n) = decode_utf7::<u32>(b"ab+Jj", "strict", true).unwrap();
        assert_eq!(n, 2);
        assert_eq!(units(&s), vec![0x61, 0x62]);
        // Feeding the rest completes the character.
        let (s, n) = decode_utf7::<u32>(b"+Jjo-", "strict", true).unwrap();
        assert_eq!(n, 5);
        assert_eq!(units(&s), vec![0x263A]);
    }

    #[test]
    fn encode_round_trip_mixed() {
        let text: Vec<u32> = "A \u{263A} day +1\u{1F600}".chars().map(|c| c as u32).collect();
        let mut b = UnitBuilder::<u32>::with_capacity(text.len()).unwrap();
        for cp in &text {
            b.push_char(*cp).unwrap();
        }
        let s = Str::from_builder(b);
        let bytes = encode_utf7(&s).unwrap();
        let (back, _) = decode_utf7::<u32>(&bytes, "strict", false).unwrap();
        assert_eq!(units(&back), text);
    }
}
