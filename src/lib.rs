//! A Unicode text subsystem: reference-counted string values over a
//! configurable code-unit width, a pooled buffer allocator with canonical
//! singletons, a pluggable error-handler protocol, and codecs for the
//! UTF family, ASCII/Latin-1, escape notations, byte-table maps and the
//! raw internal form.
//!
//! Storage width is a type parameter: [`Str<u16>`] keeps UTF-16 code units
//! and splits astral code points into surrogate pairs, [`Str<u32>`] keeps
//! one unit per code point. Everything else, codecs and error handlers
//! included, is width-independent.
//!
//! Values are thread-local by construction: buffers are not atomically
//! counted and the pools, singletons and registries all live in
//! thread-local storage.
//!
//! [`Str<u16>`]: Str
//! [`Str<u32>`]: Str

#[macro_use]
pub mod common;

pub mod buffer;
pub mod codecs;
pub mod errors;
pub mod fmt;
pub mod pool;
pub mod text;
pub mod unit;

pub use codecs::charmap::{DecodeMap, EncodeMap};
pub use codecs::escape::{set_name_resolver, NameResolver};
pub use codecs::{
    decode, decode_stateful, default_encoding, encode, register_codec, set_default_encoding,
    ByteOrder, CustomCodec,
};
pub use common::{Error, Result};
pub use errors::{register_error, DecodeHandler, DecodeRecord, EncodeHandler, EncodeRecord,
                 ErrorCallback};
pub use fmt::{chr, format_diag, ord, FormatArg};
pub use text::Str;
pub use unit::CodeUnit;

/// UTF-16 storage.
pub type NarrowStr = Str<u16>;
/// One code point per unit.
pub type WideStr = Str<u32>;
