//! UTF-8 decode and encode.
//!
//! The decoder is table-driven: a 256-entry table gives the sequence length
//! implied by the lead byte (0 marks an ill-formed lead, including the
//! overlong leads 0xC0/0xC1 and everything past 0xF4). Continuation bytes
//! are range-checked so that overlong forms, surrogate code points
//! (0xED 0xA0..), and values past U+10FFFF are all rejected at the byte
//! where they become ill-formed.

use crate::buffer::UnitBuilder;
use crate::common::{is_surrogate, Result};
use crate::errors::{DecodeErrors, EncodeErrors};
use crate::text::Str;
use crate::unit::CodeUnit;

#[rustfmt::skip]
const UTF8_LEN: [u8; 256] = [
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x00
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x10
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x20
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x30
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x40
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x50
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x60
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x70
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0x80: continuations
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0x90
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0xA0
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0xB0
    0, 0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, // 0xC0: C0/C1 overlong
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, // 0xD0
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, // 0xE0
    4, 4, 4, 4, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0xF0: > F4 out of range
];

// The first continuation byte carries the overlong/range constraints; later
// ones are plain 10xxxxxx.
#[inline]
fn valid_continuation(lead: u8, b: u8, index: usize) -> bool {
    if index != 1 {
        return b & 0xC0 == 0x80;
    }
    match lead {
        0xE0 => (0xA0..=0xBF).contains(&b),
        0xED => (0x80..=0x9F).contains(&b),
        0xF0 => (0x90..=0xBF).contains(&b),
        0xF4 => (0x80..=0x8F).contains(&b),
        _ => b & 0xC0 == 0x80,
    }
}

pub fn decode_utf8<W: CodeUnit>(
    input: &[u8],
    errors: &str,
    stream: bool,
) -> Result<(Str<W>, usize)> {
    let mut out = UnitBuilder::with_capacity(input.len())?;
    let mut errs = DecodeErrors::new("utf-8", errors);
    let mut pos = 0;
    while pos < input.len() {
        let lead = input[pos];
        if lead < 0x80 {
            out.push(W::from_u32(lead as u32))?;
            pos += 1;
            continue;
        }
        let n = UTF8_LEN[lead as usize] as usize;
        if n == 0 {
            pos = errs.handle(&mut out, input, pos, pos + 1, "invalid start byte")?;
            continue;
        }
        let avail = std::cmp::min(n, input.len() - pos);
        let mut seen = 1;
        while seen < avail && valid_continuation(lead, input[pos + seen], seen) {
            seen += 1;
        }
        if seen < avail {
            // A byte that cannot continue this sequence; the span covers
            // the maximal well-formed prefix.
            pos = errs.handle(&mut out, input, pos, pos + seen, "invalid continuation byte")?;
            continue;
        }
        if avail < n {
            if stream {
                break;
            }
            pos = errs.handle(&mut out, input, pos, input.len(), "unexpected end of data")?;
            continue;
        }
        let mut cp = (lead as u32) & (0x7F >> n);
        for i in 1..n {
            cp = (cp << 6) | (input[pos + i] as u32 & 0x3F);
        }
        out.push_char(cp)?;
        pos += n;
    }
    Ok((Str::from_builder(out), pos))
}

fn put_utf8(cp: u32, out: &mut Vec<u8>) {
    if cp < 0x80 {
        out.push(cp as u8);
    } else if cp < 0x800 {
        out.push(0xC0 | (cp >> 6) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else if cp < 0x10000 {
        out.push(0xE0 | (cp >> 12) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else {
        out.push(0xF0 | (cp >> 18) as u8);
        out.push(0x80 | ((cp >> 12) & 0x3F) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    }
}

pub fn encode_utf8<W: CodeUnit>(s: &Str<W>, errors: &str) -> Result<Vec<u8>> {
    let units = s.as_units();
    // 4 bytes per code point is the worst case on either width: a narrow
    // surrogate pair recombines into a single 4-byte sequence.
    let mut out = Vec::with_capacity(units.len() * 4);
    let mut errs = EncodeErrors::new("utf-8", errors, units);
    let mut put = |cp: u32, out: &mut Vec<u8>| {
        if is_surrogate(cp) {
            false
        } else {
            put_utf8(cp, out);
            true
        }
    };
    let mut ix = 0;
    while ix < units.len() {
        let (cp, n) = W::get_char(units, ix);
        if is_surrogate(cp) {
            ix = errs.handle(&mut out, ix, ix + n, "surrogates not allowed", &mut put)?;
        } else {
            put_utf8(cp, &mut out);
            ix += n;
        }
    }
    out.shrink_to_fit();
    Ok(out)
}
