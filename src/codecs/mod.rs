//! Codec dispatch.
//!
//! A codec is a named decode/encode pair. Built-in names resolve through a
//! static alias table; anything else falls through to codecs registered at
//! runtime via [`register_codec`]. A single process-wide default encoding
//! name (initially `"ascii"`) backs `Str::from_bytes`.

use crate::common::Result;
use crate::text::Str;
use crate::unit::CodeUnit;

use hashbrown::HashMap;

use std::cell::RefCell;
use std::rc::Rc;

pub mod ascii;
pub mod charmap;
pub mod escape;
pub mod internal;
pub mod utf16;
pub mod utf32;
pub mod utf7;
pub mod utf8;

/// Requested byte order for the utf-16/utf-32 family. `Auto` consumes a
/// leading BOM and fixes the order for the rest of the call; an explicit
/// order treats a BOM as ordinary content.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Auto,
    Le,
    Be,
}

cfg_if::cfg_if! {
    if #[cfg(target_endian = "little")] {
        pub(crate) const NATIVE_ORDER: ByteOrder = ByteOrder::Le;
    } else {
        pub(crate) const NATIVE_ORDER: ByteOrder = ByteOrder::Be;
    }
}

static_map!(
    ALIASES<&'static str, &'static str>,
    ["utf8", "utf-8"],
    ["utf-8", "utf-8"],
    ["u8", "utf-8"],
    ["ascii", "ascii"],
    ["us-ascii", "ascii"],
    ["646", "ascii"],
    ["latin", "latin-1"],
    ["latin-1", "latin-1"],
    ["latin1", "latin-1"],
    ["iso-8859-1", "latin-1"],
    ["8859", "latin-1"],
    ["cp819", "latin-1"],
    ["utf16", "utf-16"],
    ["utf-16", "utf-16"],
    ["u16", "utf-16"],
    ["utf-16-le", "utf-16-le"],
    ["utf-16le", "utf-16-le"],
    ["utf-16-be", "utf-16-be"],
    ["utf-16be", "utf-16-be"],
    ["utf32", "utf-32"],
    ["utf-32", "utf-32"],
    ["u32", "utf-32"],
    ["utf-32-le", "utf-32-le"],
    ["utf-32le", "utf-32-le"],
    ["utf-32-be", "utf-32-be"],
    ["utf-32be", "utf-32-be"],
    ["utf7", "utf-7"],
    ["utf-7", "utf-7"],
    ["u7", "utf-7"],
    ["unicode-escape", "unicode-escape"],
    ["raw-unicode-escape", "raw-unicode-escape"],
    ["unicode-internal", "unicode-internal"]
);

/// Lowercase and fold `_`/space to `-`, the normalization applied before
/// any name lookup.
pub(crate) fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '_' | ' ' => '-',
            _ => c.to_ascii_lowercase(),
        })
        .collect()
}

fn canonical(name: &str) -> Option<&'static str> {
    ALIASES.get(normalize(name).as_str()).copied()
}

/// An application-supplied codec, registered under a name. Decode and
/// encode are expressed over ordinals so one registration serves both
/// storage widths.
#[derive(Clone)]
pub struct CustomCodec {
    /// `(bytes, errors) -> (code points, bytes consumed)`
    pub decode: Rc<dyn Fn(&[u8], &str) -> Result<(Vec<u32>, usize)>>,
    /// `(code points, errors) -> bytes`
    pub encode: Rc<dyn Fn(&[u32], &str) -> Result<Vec<u8>>>,
}

thread_local! {
    static CODECS: RefCell<HashMap<String, CustomCodec>> = RefCell::new(HashMap::new());
    static DEFAULT_ENCODING: RefCell<String> = RefCell::new("ascii".to_string());
}

pub fn register_codec(name: &str, codec: CustomCodec) {
    CODECS.with(|c| {
        c.borrow_mut().insert(normalize(name), codec);
    })
}

fn lookup_codec(name: &str) -> Option<CustomCodec> {
    CODECS.with(|c| c.borrow().get(&normalize(name)).cloned())
}

/// The process default encoding name, consumed by `Str::from_bytes`.
pub fn default_encoding() -> String {
    DEFAULT_ENCODING.with(|d| d.borrow().clone())
}

/// Change the default encoding. The name is validated against the known
/// codecs before it takes effect.
pub fn set_default_encoding(name: &str) -> Result<()> {
    if canonical(name).is_none() && lookup_codec(name).is_none() {
        return err!("unknown encoding: {}", name);
    }
    DEFAULT_ENCODING.with(|d| *d.borrow_mut() = normalize(name));
    Ok(())
}

/// One-shot decode: trailing incomplete sequences are errors.
pub fn decode<W: CodeUnit>(bytes: &[u8], encoding: &str, errors: &str) -> Result<Str<W>> {
    let (s, _, _) = decode_stateful(bytes, encoding, errors, false, ByteOrder::Auto)?;
    Ok(s)
}

/// Streaming-capable decode. With `stream` set, a trailing incomplete
/// sequence is not an error: the call stops before it and reports how many
/// bytes were consumed; the caller re-invokes with the unconsumed remainder
/// prepended to new input.
///
/// `order` is the streaming byte-order state for the auto-order utf-16 and
/// utf-32 names: pass [`ByteOrder::Auto`] on the first call and the
/// returned order on each continuation, so an order fixed by a consumed BOM
/// carries across calls. Explicit-order and non-BOM codecs ignore it and
/// echo it back.
pub fn decode_stateful<W: CodeUnit>(
    bytes: &[u8],
    encoding: &str,
    errors: &str,
    stream: bool,
    order: ByteOrder,
) -> Result<(Str<W>, usize, ByteOrder)> {
    match canonical(encoding) {
        Some("ascii") => ascii::decode_ascii(bytes, errors).map(|(s, n)| (s, n, order)),
        Some("latin-1") => ascii::decode_latin1(bytes).map(|(s, n)| (s, n, order)),
        Some("utf-8") => utf8::decode_utf8(bytes, errors, stream).map(|(s, n)| (s, n, order)),
        Some("utf-16") => utf16::decode_utf16(bytes, errors, order, stream),
        Some("utf-16-le") => utf16::decode_utf16(bytes, errors, ByteOrder::Le, stream),
        Some("utf-16-be") => utf16::decode_utf16(bytes, errors, ByteOrder::Be, stream),
        Some("utf-32") => utf32::decode_utf32(bytes, errors, order, stream),
        Some("utf-32-le") => utf32::decode_utf32(bytes, errors, ByteOrder::Le, stream),
        Some("utf-32-be") => utf32::decode_utf32(bytes, errors, ByteOrder::Be, stream),
        Some("utf-7") => utf7::decode_utf7(bytes, errors, stream).map(|(s, n)| (s, n, order)),
        Some("unicode-escape") => {
            escape::decode_unicode_escape(bytes, errors, stream).map(|(s, n)| (s, n, order))
        }
        Some("raw-unicode-escape") => {
            escape::decode_raw_unicode_escape(bytes, errors, stream).map(|(s, n)| (s, n, order))
        }
        Some("unicode-internal") => {
            internal::decode_internal(bytes, errors, stream).map(|(s, n)| (s, n, order))
        }
        Some(other) => err!("codec '{}' has no decoder wired", other),
        None => match lookup_codec(encoding) {
            Some(codec) => {
                let (cps, consumed) = (codec.decode)(bytes, errors)?;
                let mut b = crate::buffer::UnitBuilder::with_capacity(cps.len() * 2)?;
                for cp in cps {
                    if cp > crate::common::MAX_CODE_POINT {
                        return err!(
                            "codec '{}' returned code point U+{:X} out of range",
                            encoding,
                            cp
                        );
                    }
                    b.push_char(cp)?;
                }
                Ok((Str::from_builder(b), consumed, order))
            }
            None => err!("unknown encoding: {}", encoding),
        },
    }
}

pub fn encode<W: CodeUnit>(s: &Str<W>, encoding: &str, errors: &str) -> Result<Vec<u8>> {
    match canonical(encoding) {
        Some("ascii") => ascii::encode_ascii(s, errors),
        Some("latin-1") => ascii::encode_latin1(s, errors),
        Some("utf-8") => utf8::encode_utf8(s, errors),
        Some("utf-16") => utf16::encode_utf16(s, errors, ByteOrder::Auto),
        Some("utf-16-le") => utf16::encode_utf16(s, errors, ByteOrder::Le),
        Some("utf-16-be") => utf16::encode_utf16(s, errors, ByteOrder::Be),
        Some("utf-32") => utf32::encode_utf32(s, errors, ByteOrder::Auto),
        Some("utf-32-le") => utf32::encode_utf32(s, errors, ByteOrder::Le),
        Some("utf-32-be") => utf32::encode_utf32(s, errors, ByteOrder::Be),
        Some("utf-7") => utf7::encode_utf7(s),
        Some("unicode-escape") => escape::encode_unicode_escape(s),
        Some("raw-unicode-escape") => escape::encode_raw_unicode_escape(s),
        Some("unicode-internal") => internal::encode_internal(s),
        Some(other) => err!("codec '{}' has no encoder wired", other),
        None => match lookup_codec(encoding) {
            Some(codec) => {
                let cps: Vec<u32> = s.chars().collect();
                (codec.encode)(&cps, errors)
            }
            None => err!("unknown encoding: {}", encoding),
        },
    }
}
