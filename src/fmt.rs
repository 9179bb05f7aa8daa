//! Conversions into string values and a printf-style formatter for
//! diagnostics.

use crate::buffer::UnitBuilder;
use crate::common::Result;
use crate::text::Str;
use crate::unit::CodeUnit;

/// A one-code-point string for `cp`.
pub fn chr<W: CodeUnit>(cp: u32) -> Result<Str<W>> {
    Str::from_char(cp)
}

/// The ordinal of a one-code-point string. A narrow surrogate pair counts
/// as one code point.
pub fn ord<W: CodeUnit>(s: &Str<W>) -> Result<u32> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(cp), None) => Ok(cp),
        _ => err!("ord() expected a single code point, got a string of length {}", s.len()),
    }
}

fn from_ascii<W: CodeUnit>(bytes: &[u8]) -> Result<Str<W>> {
    let mut b = UnitBuilder::with_capacity(bytes.len())?;
    for byte in bytes {
        b.push(W::from_u32(*byte as u32))?;
    }
    Ok(Str::from_builder(b))
}

impl<W: CodeUnit> From<i64> for Str<W> {
    fn from(i: i64) -> Str<W> {
        let mut buf = itoa::Buffer::new();
        // Digit strings are a handful of ASCII bytes; the builder cannot
        // overflow at that size.
        from_ascii(buf.format(i).as_bytes()).unwrap()
    }
}

impl<W: CodeUnit> From<f64> for Str<W> {
    fn from(f: f64) -> Str<W> {
        if f.is_finite() {
            let mut buf = ryu::Buffer::new();
            from_ascii(buf.format(f).as_bytes()).unwrap()
        } else if f.is_nan() {
            from_ascii(b"nan").unwrap()
        } else if f > 0.0 {
            from_ascii(b"inf").unwrap()
        } else {
            from_ascii(b"-inf").unwrap()
        }
    }
}

/// An argument to [`format_diag`].
pub enum FormatArg<'a, W: CodeUnit> {
    Int(i64),
    Float(f64),
    Char(u32),
    Text(&'a Str<W>),
}

/// Minimal printf-style formatting for diagnostics: `%d`, `%x`, `%f`,
/// `%c`, `%s` and `%%`. Numeric directives coerce between int and float
/// arguments; everything else must match.
pub fn format_diag<'a, W: CodeUnit>(
    fmt: &str,
    args: &[FormatArg<'a, W>],
) -> Result<Str<W>> {
    let mut out = UnitBuilder::with_capacity(fmt.len())?;
    let mut args = args.iter();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push_char(c as u32)?;
            continue;
        }
        let directive = match chars.next() {
            Some(d) => d,
            None => return err!("dangling % at end of format string"),
        };
        if directive == '%' {
            out.push_char('%' as u32)?;
            continue;
        }
        let arg = match args.next() {
            Some(a) => a,
            None => return err!("not enough arguments for format string"),
        };
        match (directive, arg) {
            ('d', FormatArg::Int(i)) => {
                let mut buf = itoa::Buffer::new();
                out.push_str(buf.format(*i))?;
            }
            ('d', FormatArg::Float(f)) => {
                let mut buf = itoa::Buffer::new();
                out.push_str(buf.format(*f as i64))?;
            }
            ('x', FormatArg::Int(i)) => out.push_str(&format!("{:x}", i))?,
            ('f', FormatArg::Float(f)) => {
                let mut buf = ryu::Buffer::new();
                out.push_str(buf.format(*f))?;
            }
            ('f', FormatArg::Int(i)) => {
                let mut buf = ryu::Buffer::new();
                out.push_str(buf.format(*i as f64))?;
            }
            ('c', FormatArg::Char(cp)) => out.push_char(*cp)?,
            ('s', FormatArg::Text(t)) => out.push_units(t.as_units())?,
            (d, _) => return err!("format directive %{} does not match its argument", d),
        }
    }
    Ok(Str::from_builder(out))
}
