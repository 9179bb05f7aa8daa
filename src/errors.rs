//! The codec error-handler protocol.
//!
//! Whenever a decode or encode step cannot proceed, the engine consults a
//! policy named at the call site ("strict", "ignore", "replace",
//! "xmlcharrefreplace", or a name registered via [`register_error`]). The
//! policy either aborts the whole call, skips the offending span, or
//! supplies replacement text and a new cursor position. Resolution from
//! name to policy happens at most once per call, on the first error; so
//! does the widening of the encode input into ordinals for the invocation
//! record.

use crate::buffer::UnitBuilder;
use crate::common::Result;
use crate::unit::CodeUnit;

use hashbrown::HashMap;
use smallvec::SmallVec;

use std::cell::RefCell;
use std::rc::Rc;

/// What a handler sees when decoding fails.
pub struct DecodeRecord<'a> {
    pub encoding: &'static str,
    pub reason: &'static str,
    /// The full byte input of the call, not just the offending span.
    pub input: &'a [u8],
    pub start: usize,
    pub end: usize,
}

/// What a handler sees when encoding fails. `input` is the full code-unit
/// input widened to ordinals one-for-one (narrow surrogate pairs are left
/// split); spans index into it.
pub struct EncodeRecord<'a> {
    pub encoding: &'static str,
    pub reason: &'static str,
    pub input: &'a [u32],
    pub start: usize,
    pub end: usize,
}

/// A decode handler returns replacement text and an absolute resume
/// position (negative counts from the end of input).
pub type DecodeHandler = Rc<dyn Fn(&DecodeRecord) -> Result<(String, isize)>>;
/// An encode handler likewise; its replacement is re-encoded by the calling
/// codec under strict semantics.
pub type EncodeHandler = Rc<dyn Fn(&EncodeRecord) -> Result<(String, isize)>>;

#[derive(Clone, Default)]
pub struct ErrorCallback {
    pub decode: Option<DecodeHandler>,
    pub encode: Option<EncodeHandler>,
}

thread_local! {
    static HANDLERS: RefCell<HashMap<String, ErrorCallback>> = RefCell::new(HashMap::new());
}

/// Register a custom error handler under `name`.
pub fn register_error(name: &str, cb: ErrorCallback) {
    HANDLERS.with(|h| {
        h.borrow_mut().insert(name.to_string(), cb);
    })
}

fn lookup_handler(name: &str) -> Option<ErrorCallback> {
    HANDLERS.with(|h| h.borrow().get(name).cloned())
}

#[derive(Clone)]
enum Policy {
    Strict,
    Ignore,
    Replace,
    XmlCharRefReplace,
    Custom(ErrorCallback),
}

fn resolve_policy(name: &str) -> Result<Policy> {
    match name {
        "strict" => Ok(Policy::Strict),
        "ignore" => Ok(Policy::Ignore),
        "replace" => Ok(Policy::Replace),
        "xmlcharrefreplace" => Ok(Policy::XmlCharRefReplace),
        _ => match lookup_handler(name) {
            Some(cb) => Ok(Policy::Custom(cb)),
            None => err!("unknown error handler name '{}'", name),
        },
    }
}

fn resolve_position(pos: isize, len: usize) -> Result<usize> {
    let p = if pos < 0 { len as isize + pos } else { pos };
    if p < 0 || p as usize > len {
        return err!("position {} from error handler out of bounds", pos);
    }
    Ok(p as usize)
}

/// Per-decode-call handler state: the policy is resolved from its name on
/// the first malformed sequence and reused for the rest of the call.
pub(crate) struct DecodeErrors<'a> {
    encoding: &'static str,
    name: &'a str,
    resolved: Option<Policy>,
}

impl<'a> DecodeErrors<'a> {
    pub fn new(encoding: &'static str, name: &'a str) -> DecodeErrors<'a> {
        DecodeErrors {
            encoding,
            name,
            resolved: None,
        }
    }

    fn policy(&mut self) -> Result<Policy> {
        if self.resolved.is_none() {
            self.resolved = Some(resolve_policy(self.name)?);
        }
        Ok(self.resolved.as_ref().unwrap().clone())
    }

    /// Handle a malformed span `[start, end)`; returns the position at
    /// which the state machine resumes.
    pub fn handle<W: CodeUnit>(
        &mut self,
        out: &mut UnitBuilder<W>,
        input: &[u8],
        start: usize,
        end: usize,
        reason: &'static str,
    ) -> Result<usize> {
        match self.policy()? {
            Policy::Strict => err!(
                "'{}' codec can't decode bytes in position {}-{}: {}",
                self.encoding,
                start,
                end,
                reason
            ),
            Policy::Ignore => Ok(end),
            Policy::Replace => {
                out.push_char(crate::common::REPLACEMENT)?;
                Ok(end)
            }
            Policy::XmlCharRefReplace => {
                err!("'xmlcharrefreplace' cannot be used for decoding")
            }
            Policy::Custom(cb) => {
                let handler = match &cb.decode {
                    Some(h) => h.clone(),
                    None => {
                        return err!(
                            "error handler '{}' does not support decoding",
                            self.name
                        )
                    }
                };
                let record = DecodeRecord {
                    encoding: self.encoding,
                    reason,
                    input,
                    start,
                    end,
                };
                let (replacement, pos) = handler(&record)?;
                out.push_str(&replacement)?;
                resolve_position(pos, input.len())
            }
        }
    }
}

/// Per-encode-call handler state. Alongside the resolved policy this caches
/// the ordinal-widened view of the input, built on the first error.
pub(crate) struct EncodeErrors<'a, W: CodeUnit> {
    encoding: &'static str,
    name: &'a str,
    resolved: Option<Policy>,
    input: &'a [W],
    widened: Option<Vec<u32>>,
}

/// Writes one code point into the output, returning `false` when the
/// codec cannot represent it.
pub(crate) type PutChar<'p> = dyn FnMut(u32, &mut Vec<u8>) -> bool + 'p;

impl<'a, W: CodeUnit> EncodeErrors<'a, W> {
    pub fn new(encoding: &'static str, name: &'a str, input: &'a [W]) -> EncodeErrors<'a, W> {
        EncodeErrors {
            encoding,
            name,
            resolved: None,
            input,
            widened: None,
        }
    }

    fn policy(&mut self) -> Result<Policy> {
        if self.resolved.is_none() {
            self.resolved = Some(resolve_policy(self.name)?);
        }
        Ok(self.resolved.as_ref().unwrap().clone())
    }

    fn widened(&mut self) -> &[u32] {
        if self.widened.is_none() {
            self.widened = Some(self.input.iter().map(|u| u.to_u32()).collect());
        }
        self.widened.as_ref().unwrap()
    }

    fn span_chars(&self, start: usize, end: usize) -> SmallVec<[u32; 4]> {
        let mut res = SmallVec::new();
        let mut ix = start;
        while ix < end {
            let (cp, n) = W::get_char(self.input, ix);
            res.push(cp);
            ix += n;
        }
        res
    }

    /// Handle an unencodable span `[start, end)` of unit indices; returns
    /// the unit index at which the encoder resumes.
    pub fn handle(
        &mut self,
        out: &mut Vec<u8>,
        start: usize,
        end: usize,
        reason: &'static str,
        put: &mut PutChar,
    ) -> Result<usize> {
        match self.policy()? {
            Policy::Strict => {
                let (cp, _) = W::get_char(self.input, start);
                err!(
                    "'{}' codec can't encode character U+{:04X} in position {}: {}",
                    self.encoding,
                    cp,
                    start,
                    reason
                )
            }
            Policy::Ignore => Ok(end),
            Policy::Replace => {
                // One '?' per offending code point (narrow pairs count
                // once).
                for _ in self.span_chars(start, end) {
                    if !put(b'?' as u32, out) {
                        return err!(
                            "'{}' codec can't encode the '?' replacement character",
                            self.encoding
                        );
                    }
                }
                Ok(end)
            }
            Policy::XmlCharRefReplace => {
                let mut digits = itoa::Buffer::new();
                for cp in self.span_chars(start, end) {
                    out.extend_from_slice(b"&#");
                    out.extend_from_slice(digits.format(cp).as_bytes());
                    out.push(b';');
                }
                Ok(end)
            }
            Policy::Custom(cb) => {
                let handler = match &cb.encode {
                    Some(h) => h.clone(),
                    None => {
                        return err!(
                            "error handler '{}' does not support encoding",
                            self.name
                        )
                    }
                };
                let len = self.input.len();
                let record = EncodeRecord {
                    encoding: self.encoding,
                    reason,
                    input: self.widened(),
                    start,
                    end,
                };
                let (replacement, pos) = handler(&record)?;
                for c in replacement.chars() {
                    if !put(c as u32, out) {
                        return err!(
                            "error handler '{}' returned a replacement the '{}' codec cannot encode",
                            self.name,
                            self.encoding
                        );
                    }
                }
                resolve_position(pos, len)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_decode<W: CodeUnit>(
        name: &str,
        input: &[u8],
        span: (usize, usize),
    ) -> Result<(Vec<u32>, usize)> {
        let mut out = UnitBuilder::<W>::with_capacity(8)?;
        let mut errs = DecodeErrors::new("test", name);
        let pos = errs.handle(&mut out, input, span.0, span.1, "bad byte")?;
        Ok((out.as_slice().iter().map(|u| u.to_u32()).collect(), pos))
    }

    #[test]
    fn builtin_decode_policies() {
        assert!(handle_decode::<u32>("strict", b"\xff", (0, 1)).is_err());
        let (units, pos) = handle_decode::<u32>("ignore", b"\xff", (0, 1)).unwrap();
        assert!(units.is_empty());
        assert_eq!(pos, 1);
        let (units, pos) = handle_decode::<u32>("replace", b"\xff", (0, 1)).unwrap();
        assert_eq!(units, vec![0xFFFD]);
        assert_eq!(pos, 1);
        // xmlcharrefreplace is encode-only.
        assert!(handle_decode::<u32>("xmlcharrefreplace", b"\xff", (0, 1)).is_err());
        assert!(handle_decode::<u32>("no-such-handler", b"\xff", (0, 1)).is_err());
    }

    #[test]
    fn custom_decode_handler_positions() {
        register_error(
            "test-skip-two",
            ErrorCallback {
                decode: Some(Rc::new(|rec: &DecodeRecord| {
                    assert_eq!(rec.encoding, "test");
                    Ok(("*".to_string(), rec.end as isize + 1))
                })),
                encode: None,
            },
        );
        let (units, pos) = handle_decode::<u16>("test-skip-two", b"\xff\xff\xff", (0, 1)).unwrap();
        assert_eq!(units, vec![b'*' as u32]);
        assert_eq!(pos, 2);

        // Negative positions are relative to the end of input.
        register_error(
            "test-from-end",
            ErrorCallback {
                decode: Some(Rc::new(|_: &DecodeRecord| Ok((String::new(), -1)))),
                encode: None,
            },
        );
        let (_, pos) = handle_decode::<u16>("test-from-end", b"abcd", (0, 1)).unwrap();
        assert_eq!(pos, 3);

        // Out-of-range positions are a hard error.
        register_error(
            "test-oob",
            ErrorCallback {
                decode: Some(Rc::new(|_: &DecodeRecord| Ok((String::new(), 99)))),
                encode: None,
            },
        );
        assert!(handle_decode::<u16>("test-oob", b"ab", (0, 1)).is_err());
    }

    #[test]
    fn encode_replace_per_code_point() {
        // A narrow surrogate pair is one code point: one '?'.
        let input: Vec<u16> = vec![0xD83D, 0xDE00];
        let mut errs = EncodeErrors::new("test", "replace", &input[..]);
        let mut out = Vec::new();
        let mut put = |cp: u32, out: &mut Vec<u8>| {
            out.push(cp as u8);
            true
        };
        let pos = errs.handle(&mut out, 0, 2, "unmapped", &mut put).unwrap();
        assert_eq!(out, b"?");
        assert_eq!(pos, 2);
    }

    #[test]
    fn xmlcharrefreplace_combines_pairs() {
        let input: Vec<u16> = vec![0xD83D, 0xDE00, 0x00FF];
        let mut errs = EncodeErrors::new("test", "xmlcharrefreplace", &input[..]);
        let mut out = Vec::new();
        let mut put = |_: u32, _: &mut Vec<u8>| false;
        let pos = errs.handle(&mut out, 0, 3, "unmapped", &mut put).unwrap();
        assert_eq!(out, b"&#128512;&#255;");
        assert_eq!(pos, 3);
    }

    #[test]
    fn custom_encode_handler_reencodes_replacement() {
        register_error(
            "test-enc",
            ErrorCallback {
                decode: None,
                encode: Some(Rc::new(|rec: &EncodeRecord| {
                    assert_eq!(rec.input, &[0x2764]);
                    Ok(("ok".to_string(), rec.end as isize))
                })),
            },
        );
        let input: Vec<u32> = vec![0x2764];
        let mut errs = EncodeErrors::new("test", "test-enc", &input[..]);
        let mut out = Vec::new();
        let mut put = |cp: u32, out: &mut Vec<u8>| {
            if cp < 0x80 {
                out.push(cp as u8);
                true
            } else {
                false
            }
        };
        let pos = errs.handle(&mut out, 0, 1, "unmapped", &mut put).unwrap();
        assert_eq!(out, b"ok");
        assert_eq!(pos, 1);
    }
}
