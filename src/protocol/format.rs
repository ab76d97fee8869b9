//! Command formatting
//!
//! Turns a printf-style format string plus positional arguments into an
//! argument vector. The conversions follow hiredis: everything printf
//! knows, plus `%b` for a length-delimited binary blob.
//!
//! The format is split on whitespace. Each token becomes one argument,
//! and literal text may be glued to a conversion (`user:%d`). Whitespace
//! produced *by* a conversion never splits an argument, so `%s` and `%b`
//! payloads may contain spaces.
//!
//! `%s` takes C-string semantics and stops at the first NUL byte. `%b`
//! copies its payload verbatim.

use crate::error::{RespError, Result};

/// One positional argument for a format string
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatArg<'a> {
    Str(&'a str),
    Bytes(&'a [u8]),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
}

impl FormatArg<'_> {
    fn kind(&self) -> &'static str {
        match self {
            FormatArg::Str(_) => "string",
            FormatArg::Bytes(_) => "bytes",
            FormatArg::Int(_) => "signed integer",
            FormatArg::UInt(_) => "unsigned integer",
            FormatArg::Float(_) => "float",
            FormatArg::Char(_) => "char",
        }
    }
}

impl<'a> From<&'a str> for FormatArg<'a> {
    fn from(s: &'a str) -> Self {
        FormatArg::Str(s)
    }
}

impl<'a> From<&'a String> for FormatArg<'a> {
    fn from(s: &'a String) -> Self {
        FormatArg::Str(s)
    }
}

impl<'a> From<&'a [u8]> for FormatArg<'a> {
    fn from(b: &'a [u8]) -> Self {
        FormatArg::Bytes(b)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for FormatArg<'a> {
    fn from(b: &'a [u8; N]) -> Self {
        FormatArg::Bytes(b)
    }
}

impl<'a> From<&'a Vec<u8>> for FormatArg<'a> {
    fn from(b: &'a Vec<u8>) -> Self {
        FormatArg::Bytes(b)
    }
}

impl<'a> From<&'a bytes::Bytes> for FormatArg<'a> {
    fn from(b: &'a bytes::Bytes) -> Self {
        FormatArg::Bytes(b)
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $wide:ty, $($t:ty),+) => {
        $(impl From<$t> for FormatArg<'_> {
            fn from(n: $t) -> Self {
                FormatArg::$variant(n as $wide)
            }
        })+
    };
}

impl_from_int!(Int, i64, i8, i16, i32, i64, isize);
impl_from_int!(UInt, u64, u8, u16, u32, u64, usize);

impl From<f32> for FormatArg<'_> {
    fn from(n: f32) -> Self {
        FormatArg::Float(n as f64)
    }
}

impl From<f64> for FormatArg<'_> {
    fn from(n: f64) -> Self {
        FormatArg::Float(n)
    }
}

impl From<char> for FormatArg<'_> {
    fn from(c: char) -> Self {
        FormatArg::Char(c)
    }
}

/// Parsed `%[flags][width][.precision][length]conv`
#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
    conv: u8,
}

/// Expand `format` against `args` into an argument vector
pub fn format_command(format: &str, args: &[FormatArg<'_>]) -> Result<Vec<Vec<u8>>> {
    let fmt = format.as_bytes();
    let mut argv = Vec::new();
    let mut current = Vec::new();
    let mut touched = false;
    let mut next_arg = 0;
    let mut i = 0;

    while i < fmt.len() {
        let c = fmt[i];
        if c.is_ascii_whitespace() {
            if touched {
                argv.push(std::mem::take(&mut current));
                touched = false;
            }
            i += 1;
            continue;
        }

        touched = true;
        if c != b'%' {
            current.push(c);
            i += 1;
            continue;
        }

        if fmt.get(i + 1) == Some(&b'%') {
            current.push(b'%');
            i += 2;
            continue;
        }

        let (spec, end) = parse_spec(fmt, i + 1)?;
        i = end;

        let arg = args.get(next_arg).ok_or_else(|| {
            RespError::Format(format!("missing argument for '%{}'", spec.conv as char))
        })?;
        next_arg += 1;

        render(&spec, arg, &mut current)?;
    }

    if touched {
        argv.push(current);
    }

    if next_arg < args.len() {
        return Err(RespError::Format(format!(
            "{} argument(s) not consumed by format",
            args.len() - next_arg
        )));
    }
    if argv.is_empty() {
        return Err(RespError::EmptyCommand);
    }
    Ok(argv)
}

fn parse_spec(fmt: &[u8], mut i: usize) -> Result<(Spec, usize)> {
    let mut spec = Spec::default();

    while let Some(&c) = fmt.get(i) {
        match c {
            b'-' => spec.left = true,
            b'0' => spec.zero = true,
            b'+' => spec.plus = true,
            b' ' => spec.space = true,
            b'#' => spec.alt = true,
            _ => break,
        }
        i += 1;
    }

    let (width, next) = read_digits(fmt, i)?;
    spec.width = width.unwrap_or(0);
    i = next;

    if fmt.get(i) == Some(&b'.') {
        let (precision, next) = read_digits(fmt, i + 1)?;
        spec.precision = Some(precision.unwrap_or(0));
        i = next;
    }

    if fmt.get(i) == Some(&b'*') {
        return Err(RespError::Format("'*' width/precision is not supported".to_string()));
    }

    // Length modifiers carry no meaning once arguments are typed
    while let Some(b'h' | b'l' | b'L' | b'q' | b'z' | b'j' | b't') = fmt.get(i) {
        i += 1;
    }

    match fmt.get(i) {
        Some(&conv) if b"sbdiuxXocfFeEgG".contains(&conv) => {
            spec.conv = conv;
            Ok((spec, i + 1))
        }
        Some(&other) => Err(RespError::Format(format!(
            "unknown conversion '%{}'",
            other.escape_ascii()
        ))),
        None => Err(RespError::Format("format ends inside a conversion".to_string())),
    }
}

/// Width and precision share printf's `int` range
const MAX_FIELD: usize = i32::MAX as usize;

fn read_digits(fmt: &[u8], mut i: usize) -> Result<(Option<usize>, usize)> {
    let start = i;
    let mut value = 0usize;
    while let Some(&d) = fmt.get(i) {
        if !d.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add((d - b'0') as usize);
        if value > MAX_FIELD {
            return Err(RespError::Format(format!(
                "field width or precision exceeds {}",
                MAX_FIELD
            )));
        }
        i += 1;
    }
    Ok(((i > start).then_some(value), i))
}

fn mismatch(spec: &Spec, arg: &FormatArg<'_>) -> RespError {
    RespError::Format(format!(
        "'%{}' cannot format a {} argument",
        spec.conv as char,
        arg.kind()
    ))
}

fn render(spec: &Spec, arg: &FormatArg<'_>, out: &mut Vec<u8>) -> Result<()> {
    match spec.conv {
        b'b' => {
            let blob: &[u8] = match *arg {
                FormatArg::Bytes(b) => b,
                FormatArg::Str(s) => s.as_bytes(),
                _ => return Err(mismatch(spec, arg)),
            };
            out.extend_from_slice(blob);
        }
        b's' => {
            let raw: &[u8] = match *arg {
                FormatArg::Str(s) => s.as_bytes(),
                FormatArg::Bytes(b) => b,
                _ => return Err(mismatch(spec, arg)),
            };
            let nul = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let take = spec.precision.map_or(nul, |p| p.min(nul));
            pad(spec, b"", &raw[..take], false, out);
        }
        b'c' => {
            // Integers are one raw byte, as in C; a char is its UTF-8 form
            let mut utf8 = [0u8; 4];
            let encoded: &[u8] = match *arg {
                FormatArg::Char(c) => c.encode_utf8(&mut utf8).as_bytes(),
                FormatArg::Int(n) => {
                    utf8[0] = n as u8;
                    &utf8[..1]
                }
                FormatArg::UInt(n) => {
                    utf8[0] = n as u8;
                    &utf8[..1]
                }
                _ => return Err(mismatch(spec, arg)),
            };
            pad(spec, b"", encoded, false, out);
        }
        b'd' | b'i' => {
            let n: i128 = match *arg {
                FormatArg::Int(n) => n as i128,
                FormatArg::UInt(n) => n as i128,
                _ => return Err(mismatch(spec, arg)),
            };
            let sign = sign_prefix(spec, n < 0);
            let digits = integer_digits(n.unsigned_abs().to_string(), spec.precision);
            pad(spec, sign, digits.as_bytes(), spec.precision.is_none(), out);
        }
        b'u' | b'x' | b'X' | b'o' => {
            let n: u64 = match *arg {
                FormatArg::UInt(n) => n,
                FormatArg::Int(n) => n as u64,
                _ => return Err(mismatch(spec, arg)),
            };
            let (body, prefix): (String, &[u8]) = match spec.conv {
                b'x' => (format!("{:x}", n), alt_prefix(spec, n, b"0x")),
                b'X' => (format!("{:X}", n), alt_prefix(spec, n, b"0X")),
                b'o' => (format!("{:o}", n), alt_prefix(spec, n, b"0")),
                _ => (n.to_string(), &b""[..]),
            };
            let digits = integer_digits(body, spec.precision);
            pad(spec, prefix, digits.as_bytes(), spec.precision.is_none(), out);
        }
        _ => {
            let v = match *arg {
                FormatArg::Float(v) => v,
                _ => return Err(mismatch(spec, arg)),
            };
            let sign = sign_prefix(spec, v.is_sign_negative() && !v.is_nan());
            let body = float_body(spec, v.abs());
            pad(spec, sign, body.as_bytes(), v.is_finite(), out);
        }
    }
    Ok(())
}

fn sign_prefix(spec: &Spec, negative: bool) -> &'static [u8] {
    if negative {
        b"-"
    } else if spec.plus {
        b"+"
    } else if spec.space {
        b" "
    } else {
        &[]
    }
}

fn alt_prefix(spec: &Spec, n: u64, prefix: &'static [u8]) -> &'static [u8] {
    if spec.alt && n != 0 {
        prefix
    } else {
        &[]
    }
}

/// Apply an integer precision (minimum digit count)
fn integer_digits(digits: String, precision: Option<usize>) -> String {
    match precision {
        Some(0) if digits == "0" => String::new(),
        Some(p) if p > digits.len() => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    }
}

/// Write `prefix` + `body` into `out`, padded to the field width
fn pad(spec: &Spec, prefix: &[u8], body: &[u8], zero_ok: bool, out: &mut Vec<u8>) {
    let len = prefix.len() + body.len();
    let fill = spec.width.saturating_sub(len);

    if spec.left {
        out.extend_from_slice(prefix);
        out.extend_from_slice(body);
        out.resize(out.len() + fill, b' ');
    } else if spec.zero && zero_ok {
        out.extend_from_slice(prefix);
        out.resize(out.len() + fill, b'0');
        out.extend_from_slice(body);
    } else {
        out.resize(out.len() + fill, b' ');
        out.extend_from_slice(prefix);
        out.extend_from_slice(body);
    }
}

fn float_body(spec: &Spec, v: f64) -> String {
    let upper = spec.conv.is_ascii_uppercase();
    let text = if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        "inf".to_string()
    } else {
        let precision = spec.precision.unwrap_or(6);
        match spec.conv {
            b'f' | b'F' => fixed(v, precision, spec.alt),
            b'e' | b'E' => exponent(v, precision, spec.alt),
            _ => general(v, precision, spec.alt),
        }
    };
    if upper {
        text.to_ascii_uppercase()
    } else {
        text
    }
}

fn fixed(v: f64, precision: usize, alt: bool) -> String {
    let mut s = format!("{:.*}", precision, v);
    if alt && precision == 0 {
        s.push('.');
    }
    s
}

/// C-style `%e`: mantissa, then a signed exponent of at least two digits
fn exponent(v: f64, precision: usize, alt: bool) -> String {
    let rust = format!("{:.*e}", precision, v);
    let (mantissa, exp) = rust.split_once('e').unwrap_or((rust.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let dot = if alt && precision == 0 { "." } else { "" };
    format!("{}{}e{}{:02}", mantissa, dot, sign, exp.abs())
}

/// C-style `%g`: shortest of `%e`/`%f` with trailing zeros removed
fn general(v: f64, precision: usize, alt: bool) -> String {
    let p = precision.max(1);
    let exp = if v == 0.0 {
        0
    } else {
        let rounded = format!("{:.*e}", p - 1, v);
        rounded
            .split_once('e')
            .and_then(|(_, e)| e.parse::<i64>().ok())
            .unwrap_or(0)
    };

    let mut s = if exp < -4 || exp >= p as i64 {
        exponent(v, p - 1, alt)
    } else {
        fixed(v, (p as i64 - 1 - exp) as usize, alt)
    };

    if !alt {
        s = strip_fraction_zeros(&s);
    }
    s
}

fn strip_fraction_zeros(s: &str) -> String {
    let (number, exp) = match s.find('e') {
        Some(pos) => s.split_at(pos),
        None => (s, ""),
    };
    let number = if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    };
    format!("{}{}", number, exp)
}
