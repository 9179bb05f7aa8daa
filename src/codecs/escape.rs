//! unicode-escape and raw-unicode-escape.
//!
//! Both decode unescaped bytes as Latin-1 ordinals. The full codec knows
//! the whole C-style escape family; the raw variant recognizes only
//! `\uXXXX` and `\UXXXXXXXX`, every other backslash is literal content.
//! `\N{NAME}` resolution is delegated to an application-installed resolver;
//! without one every named escape is an error.

use crate::buffer::UnitBuilder;
use crate::common::{Result, MAX_CODE_POINT};
use crate::errors::DecodeErrors;
use crate::text::Str;
use crate::unit::CodeUnit;

use memchr::memchr;

use std::cell::RefCell;
use std::rc::Rc;

pub type NameResolver = Rc<dyn Fn(&str) -> Option<u32>>;

thread_local! {
    static NAME_RESOLVER: RefCell<Option<NameResolver>> = RefCell::new(None);
}

/// Install the lookup behind `\N{NAME}` escapes, e.g. a Unicode names
/// table. Replaces any previous resolver.
pub fn set_name_resolver(f: NameResolver) {
    NAME_RESOLVER.with(|r| *r.borrow_mut() = Some(f))
}

fn resolve_name(name: &str) -> Option<u32> {
    NAME_RESOLVER.with(|r| r.borrow().as_ref().and_then(|f| f(name)))
}

#[inline]
fn hex_value(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u32),
        b'a'..=b'f' => Some((b - b'a' + 10) as u32),
        b'A'..=b'F' => Some((b - b'A' + 10) as u32),
        _ => None,
    }
}

// Parse exactly `digits` hex digits at `pos`. None means a non-hex byte or
// end of input intervened.
fn parse_hex(input: &[u8], pos: usize, digits: usize) -> Option<u32> {
    if pos + digits > input.len() {
        return None;
    }
    let mut v = 0;
    for i in 0..digits {
        v = (v << 4) | hex_value(input[pos + i])?;
    }
    Some(v)
}

// Copy the unescaped run starting at `pos` (Latin-1 ordinals), returning
// the index of the next backslash or the end of input.
fn copy_plain<W: CodeUnit>(input: &[u8], pos: usize, out: &mut UnitBuilder<W>) -> Result<usize> {
    let stop = match memchr(b'\\', &input[pos..]) {
        Some(off) => pos + off,
        None => input.len(),
    };
    for b in &input[pos..stop] {
        out.push(W::from_u32(*b as u32))?;
    }
    Ok(stop)
}

pub fn decode_unicode_escape<W: CodeUnit>(
    input: &[u8],
    errors: &str,
    stream: bool,
) -> Result<(Str<W>, usize)> {
    let mut out = UnitBuilder::with_capacity(input.len())?;
    let mut errs = DecodeErrors::new("unicode-escape", errors);
    let mut pos = 0;
    while pos < input.len() {
        pos = copy_plain(input, pos, &mut out)?;
        if pos >= input.len() {
            break;
        }
        let bs = pos;
        if bs + 1 >= input.len() {
            if stream {
                break;
            }
            pos = errs.handle(&mut out, input, bs, input.len(), "\\ at end of string")?;
            continue;
        }
        let c = input[bs + 1];
        match c {
            b'\n' => pos = bs + 2,
            b'\\' | b'\'' | b'"' => {
                out.push(W::from_u32(c as u32))?;
                pos = bs + 2;
            }
            b'a' => {
                out.push(W::from_u32(0x07))?;
                pos = bs + 2;
            }
            b'b' => {
                out.push(W::from_u32(0x08))?;
                pos = bs + 2;
            }
            b't' => {
                out.push(W::from_u32(0x09))?;
                pos = bs + 2;
            }
            b'n' => {
                out.push(W::from_u32(0x0A))?;
                pos = bs + 2;
            }
            b'v' => {
                out.push(W::from_u32(0x0B))?;
                pos = bs + 2;
            }
            b'f' => {
                out.push(W::from_u32(0x0C))?;
                pos = bs + 2;
            }
            b'r' => {
                out.push(W::from_u32(0x0D))?;
                pos = bs + 2;
            }
            b'0'..=b'7' => {
                // Up to three octal digits.
                let mut v = (c - b'0') as u32;
                let mut end = bs + 2;
                while end < input.len() && end < bs + 4 && (b'0'..=b'7').contains(&input[end]) {
                    v = (v << 3) | (input[end] - b'0') as u32;
                    end += 1;
                }
                out.push_char(v)?;
                pos = end;
            }
            b'x' => match parse_hex(input, bs + 2, 2) {
                Some(v) => {
                    out.push_char(v)?;
                    pos = bs + 4;
                }
                None => {
                    if stream && bs + 4 > input.len() {
                        break;
                    }
                    pos = errs.handle(
                        &mut out,
                        input,
                        bs,
                        std::cmp::min(bs + 4, input.len()),
                        "truncated \\xXX escape",
                    )?;
                }
            },
            b'u' => match parse_hex(input, bs + 2, 4) {
                Some(v) => {
                    out.push_char(v)?;
                    pos = bs + 6;
                }
                None => {
                    if stream && bs + 6 > input.len() {
                        break;
                    }
                    pos = errs.handle(
                        &mut out,
                        input,
                        bs,
                        std::cmp::min(bs + 6, input.len()),
                        "truncated \\uXXXX escape",
                    )?;
                }
            },
            b'U' => match parse_hex(input, bs + 2, 8) {
                Some(v) if v <= MAX_CODE_POINT => {
                    out.push_char(v)?;
                    pos = bs + 10;
                }
                Some(_) => {
                    pos = errs.handle(&mut out, input, bs, bs + 10, "illegal Unicode character")?;
                }
                None => {
                    if stream && bs + 10 > input.len() {
                        break;
                    }
                    pos = errs.handle(
                        &mut out,
                        input,
                        bs,
                        std::cmp::min(bs + 10, input.len()),
                        "truncated \\UXXXXXXXX escape",
                    )?;
                }
            },
            b'N' => {
                if bs + 2 >= input.len() {
                    if stream {
                        break;
                    }
                    pos = errs.handle(
                        &mut out,
                        input,
                        bs,
                        input.len(),
                        "malformed \\N character escape",
                    )?;
                    continue;
                }
                if input[bs + 2] != b'{' {
                    pos = errs.handle(
                        &mut out,
                        input,
                        bs,
                        bs + 3,
                        "malformed \\N character escape",
                    )?;
                    continue;
                }
                match memchr(b'}', &input[bs + 3..]) {
                    Some(off) => {
                        let name_end = bs + 3 + off;
                        let name = std::str::from_utf8(&input[bs + 3..name_end])
                            .ok()
                            .and_then(resolve_name);
                        match name {
                            Some(cp) => {
                                out.push_char(cp)?;
                                pos = name_end + 1;
                            }
                            None => {
                                pos = errs.handle(
                                    &mut out,
                                    input,
                                    bs,
                                    name_end + 1,
                                    "unknown Unicode character name",
                                )?;
                            }
                        }
                    }
                    None => {
                        if stream {
                            break;
                        }
                        pos = errs.handle(
                            &mut out,
                            input,
                            bs,
                            input.len(),
                            "malformed \\N character escape",
                        )?;
                    }
                }
            }
            _ => {
                // Unknown escapes keep the backslash and the character.
                out.push(W::from_u32(b'\\' as u32))?;
                out.push(W::from_u32(c as u32))?;
                pos = bs + 2;
            }
        }
    }
    Ok((Str::from_builder(out), pos))
}

pub fn decode_raw_unicode_escape<W: CodeUnit>(
    input: &[u8],
    errors: &str,
    stream: bool,
) -> Result<(Str<W>, usize)> {
    let mut out = UnitBuilder::with_capacity(input.len())?;
    let mut errs = DecodeErrors::new("raw-unicode-escape", errors);
    let mut pos = 0;
    while pos < input.len() {
        pos = copy_plain(input, pos, &mut out)?;
        if pos >= input.len() {
            break;
        }
        let bs = pos;
        if bs + 1 >= input.len() {
            if stream {
                break;
            }
            out.push(W::from_u32(b'\\' as u32))?;
            pos = bs + 1;
            continue;
        }
        let c = input[bs + 1];
        let (digits, reason, limit): (usize, &'static str, u32) = match c {
            b'u' => (4, "truncated \\uXXXX escape", MAX_CODE_POINT),
            b'U' => (8, "truncated \\UXXXXXXXX escape", MAX_CODE_POINT),
            _ => {
                // Not an escape: both bytes are content. A backslash pair
                // therefore shields the 'u' that follows it.
                out.push(W::from_u32(b'\\' as u32))?;
                out.push(W::from_u32(c as u32))?;
                pos = bs + 2;
                continue;
            }
        };
        match parse_hex(input, bs + 2, digits) {
            Some(v) if v <= limit => {
                out.push_char(v)?;
                pos = bs + 2 + digits;
            }
            Some(_) => {
                pos = errs.handle(
                    &mut out,
                    input,
                    bs,
                    bs + 2 + digits,
                    "\\Uxxxxxxxx out of range",
                )?;
            }
            None => {
                if stream && bs + 2 + digits > input.len() {
                    break;
                }
                pos = errs.handle(
                    &mut out,
                    input,
                    bs,
                    std::cmp::min(bs + 2 + digits, input.len()),
                    reason,
                )?;
            }
        }
    }
    Ok((Str::from_builder(out), pos))
}

const HEX: &[u8; 16] = b"0123456789abcdef";

fn push_hex(cp: u32, digits: usize, out: &mut Vec<u8>) {
    for i in (0..digits).rev() {
        out.push(HEX[((cp >> (i * 4)) & 0xF) as usize]);
    }
}

pub fn encode_unicode_escape<W: CodeUnit>(s: &Str<W>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    for cp in s.chars() {
        match cp {
            0x5C => out.extend_from_slice(b"\\\\"),
            0x09 => out.extend_from_slice(b"\\t"),
            0x0A => out.extend_from_slice(b"\\n"),
            0x0D => out.extend_from_slice(b"\\r"),
            0x20..=0x7E => out.push(cp as u8),
            _ if cp < 0x100 => {
                out.extend_from_slice(b"\\x");
                push_hex(cp, 2, &mut out);
            }
            _ if cp < 0x10000 => {
                out.extend_from_slice(b"\\u");
                push_hex(cp, 4, &mut out);
            }
            _ => {
                out.extend_from_slice(b"\\U");
                push_hex(cp, 8, &mut out);
            }
        }
    }
    out.shrink_to_fit();
    Ok(out)
}

pub fn encode_raw_unicode_escape<W: CodeUnit>(s: &Str<W>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    for cp in s.chars() {
        if cp < 0x100 {
            out.push(cp as u8);
        } else if cp < 0x10000 {
            out.extend_from_slice(b"\\u");
            push_hex(cp, 4, &mut out);
        } else {
            out.extend_from_slice(b"\\U");
            push_hex(cp, 8, &mut out);
        }
    }
    out.shrink_to_fit();
    Ok(out)
}
