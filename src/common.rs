//! Common type definitions and utilities used in other parts of the crate.

pub type Result<T> = std::result::Result<T, Error>;

/// The fatal error type for the text subsystem.
///
/// Recoverable malformed-input conditions never show up here; those are
/// resolved internally by the error-handler protocol. `Error` covers the
/// always-fatal taxonomy: handler contract violations, allocation overflow,
/// and configuration errors such as unknown encoding names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error(pub String);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Error {}

macro_rules! err {
    ($head:expr) => {
        Err($crate::common::Error(
                format!(concat!("[", file!(), ":", line!(), ":", column!(), "] ", $head))
        ))
    };
    ($head:expr, $($t:expr),+) => {
        Err($crate::common::Error(
                format!(concat!("[", file!(), ":", line!(), ":", column!(), "] ", $head), $($t),*)
        ))
    };
}

macro_rules! static_map {
    ($name:ident<$kty:ty, $vty:ty>, $([$k:expr, $v:expr]),*) => {
        lazy_static::lazy_static! {
            pub(crate) static ref $name: hashbrown::HashMap<$kty,$vty> = {
                let mut m = hashbrown::HashMap::new();
                $(
                    m.insert($k, $v);
                )*
                m
            };
        }
    }
}

/// Largest Unicode scalar value.
pub const MAX_CODE_POINT: u32 = 0x10FFFF;

/// The replacement character emitted by the `replace` decode policy.
pub const REPLACEMENT: u32 = 0xFFFD;

#[inline]
pub(crate) fn is_high_surrogate(cp: u32) -> bool {
    (0xD800..0xDC00).contains(&cp)
}

#[inline]
pub(crate) fn is_low_surrogate(cp: u32) -> bool {
    (0xDC00..0xE000).contains(&cp)
}

#[inline]
pub(crate) fn is_surrogate(cp: u32) -> bool {
    (0xD800..0xE000).contains(&cp)
}

#[inline]
pub(crate) fn combine_surrogates(hi: u32, lo: u32) -> u32 {
    debug_assert!(is_high_surrogate(hi) && is_low_surrogate(lo));
    0x10000 + (((hi - 0xD800) << 10) | (lo - 0xDC00))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surrogate_math() {
        // U+1F600 is <D83D DE00> as a pair.
        assert!(is_high_surrogate(0xD83D));
        assert!(is_low_surrogate(0xDE00));
        assert_eq!(combine_surrogates(0xD83D, 0xDE00), 0x1F600);
        assert_eq!(combine_surrogates(0xD800, 0xDC00), 0x10000);
        assert_eq!(combine_surrogates(0xDBFF, 0xDFFF), MAX_CODE_POINT);
        assert!(!is_surrogate(0x10000));
    }
}
