//! UTF-32 in both byte orders.
//!
//! Same BOM discipline as utf-16: `Auto` consumes FF FE 00 00 / 00 00 FE FF
//! and falls back to the native order, an explicit order leaves a BOM in the
//! content. Ordinals in the surrogate range pass through; only values past
//! U+10FFFF go to the error handler.

use crate::buffer::UnitBuilder;
use crate::codecs::{ByteOrder, NATIVE_ORDER};
use crate::common::{Result, MAX_CODE_POINT};
use crate::errors::DecodeErrors;
use crate::text::Str;
use crate::unit::CodeUnit;

#[inline]
fn read_u32(input: &[u8], pos: usize, order: ByteOrder) -> u32 {
    let chunk = [input[pos], input[pos + 1], input[pos + 2], input[pos + 3]];
    match order {
        ByteOrder::Be => u32::from_be_bytes(chunk),
        _ => u32::from_le_bytes(chunk),
    }
}

#[inline]
fn push_u32(v: u32, order: ByteOrder, out: &mut Vec<u8>) {
    let bytes = match order {
        ByteOrder::Be => v.to_be_bytes(),
        _ => v.to_le_bytes(),
    };
    out.extend_from_slice(&bytes);
}

pub fn decode_utf32<W: CodeUnit>(
    input: &[u8],
    errors: &str,
    order: ByteOrder,
    stream: bool,
) -> Result<(Str<W>, usize, ByteOrder)> {
    let mut pos = 0;
    let order = match order {
        ByteOrder::Auto => {
            if input.len() >= 4 && input[..4] == [0xFF, 0xFE, 0x00, 0x00] {
                pos = 4;
                ByteOrder::Le
            } else if input.len() >= 4 && input[..4] == [0x00, 0x00, 0xFE, 0xFF] {
                pos = 4;
                ByteOrder::Be
            } else if input.len() < 4 && stream {
                let out = UnitBuilder::with_capacity(0)?;
                return Ok((Str::from_builder(out), 0, ByteOrder::Auto));
            } else {
                NATIVE_ORDER
            }
        }
        explicit => explicit,
    };
    let mut out = UnitBuilder::with_capacity(input.len() / 4)?;
    let mut errs = DecodeErrors::new("utf-32", errors);
    while pos < input.len() {
        if pos + 4 > input.len() {
            if stream {
                break;
            }
            pos = errs.handle(&mut out, input, pos, input.len(), "truncated data")?;
            continue;
        }
        let cp = read_u32(input, pos, order);
        if cp > MAX_CODE_POINT {
            pos = errs.handle(&mut out, input, pos, pos + 4, "code point not in range(0x110000)")?;
            continue;
        }
        out.push_char(cp)?;
        pos += 4;
    }
    Ok((Str::from_builder(out), pos, order))
}

// Encoding is total over ordinals: lone surrogates write through, which
// keeps encode(decode(bytes)) byte-stable. The errors argument is accepted
// for dispatch uniformity but nothing here can fail per code point.
pub fn encode_utf32<W: CodeUnit>(s: &Str<W>, _errors: &str, order: ByteOrder) -> Result<Vec<u8>> {
    let units = s.as_units();
    let mut out = Vec::with_capacity(units.len() * 4 + 4);
    let write_order = match order {
        ByteOrder::Auto => {
            push_u32(0xFEFF, NATIVE_ORDER, &mut out);
            NATIVE_ORDER
        }
        explicit => explicit,
    };
    let mut ix = 0;
    while ix < units.len() {
        let (cp, n) = W::get_char(units, ix);
        push_u32(cp, write_order, &mut out);
        ix += n;
    }
    out.shrink_to_fit();
    Ok(out)
}
