//! printf-style rendering and parsing for column value formats.
//!
//! Only the subset used by column formats is supported: the verbs
//! `d x f e g s v` with `- + 0` flags, width and precision, plus `%%`.
//! A format holds at most one value verb; literal text around it is kept.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatArg<'a> {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(&'a str),
    Bool(bool),
}

/// Value recovered from formatted text by [`scan`]
#[derive(Debug, Clone, PartialEq)]
pub enum Scanned {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Default)]
struct Spec {
    minus: bool,
    plus: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
    verb: char,
}

enum Piece {
    Literal(String),
    Verb(Spec),
}

fn parse(format: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            literal.push('%');
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&f) = chars.peek() {
            match f {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                '0' => spec.zero = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        spec.width = width.parse().ok();
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut precision = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                precision.push(d);
                chars.next();
            }
            spec.precision = Some(precision.parse().unwrap_or(0));
        }
        match chars.next() {
            Some(verb) => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                spec.verb = verb;
                pieces.push(Piece::Verb(spec));
            }
            None => literal.push('%'),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

/// Render `arg` through a printf-style format
pub fn sprintf(format: &str, arg: FormatArg<'_>) -> String {
    let mut out = String::new();
    for piece in parse(format) {
        match piece {
            Piece::Literal(s) => out.push_str(&s),
            Piece::Verb(spec) => out.push_str(&render(&spec, arg)),
        }
    }
    out
}

fn render(spec: &Spec, arg: FormatArg<'_>) -> String {
    let body = match (spec.verb, arg) {
        ('d', FormatArg::Int(i)) => i.to_string(),
        ('d', FormatArg::UInt(u)) => u.to_string(),
        ('d', FormatArg::Float(f)) => (f.trunc() as i64).to_string(),
        ('x', FormatArg::Int(i)) => {
            if i < 0 {
                format!("-{:x}", i.unsigned_abs())
            } else {
                format!("{:x}", i)
            }
        }
        ('x', FormatArg::UInt(u)) => format!("{:x}", u),
        ('f' | 'F', a) => match as_float(a) {
            Some(f) => format!("{:.*}", spec.precision.unwrap_or(6), f),
            None => display(a),
        },
        ('e', a) => match as_float(a) {
            Some(f) => go_exponent(&format!("{:.*e}", spec.precision.unwrap_or(6), f)),
            None => display(a),
        },
        ('g', a) => match as_float(a) {
            Some(f) => format_g(f, spec.precision),
            None => display(a),
        },
        ('s' | 'v', a) => {
            let s = display(a);
            match spec.precision {
                Some(p) if matches!(a, FormatArg::Str(_)) => s.chars().take(p).collect(),
                _ => s,
            }
        }
        (_, a) => display(a),
    };

    let numeric = !matches!(arg, FormatArg::Str(_) | FormatArg::Bool(_));
    let body = if spec.plus && numeric && !body.starts_with('-') {
        format!("+{}", body)
    } else {
        body
    };
    pad(spec, body, numeric)
}

fn pad(spec: &Spec, body: String, numeric: bool) -> String {
    let len = body.chars().count();
    let width = match spec.width {
        Some(w) if w > len => w,
        _ => return body,
    };
    let fill = width - len;
    if spec.minus {
        format!("{}{}", body, " ".repeat(fill))
    } else if spec.zero && numeric {
        let (sign, digits) = match body.chars().next() {
            Some(c @ ('-' | '+')) => (c.to_string(), body[1..].to_string()),
            _ => (String::new(), body),
        };
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

fn as_float(arg: FormatArg<'_>) -> Option<f64> {
    match arg {
        FormatArg::Int(i) => Some(i as f64),
        FormatArg::UInt(u) => Some(u as f64),
        FormatArg::Float(f) => Some(f),
        _ => None,
    }
}

fn display(arg: FormatArg<'_>) -> String {
    match arg {
        FormatArg::Int(i) => i.to_string(),
        FormatArg::UInt(u) => u.to_string(),
        FormatArg::Float(f) => format_g(f, None),
        FormatArg::Str(s) => s.to_string(),
        FormatArg::Bool(b) => b.to_string(),
    }
}

/// `1.5e3` -> `1.5e+03`
fn go_exponent(s: &str) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s.to_string(),
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

fn format_g(f: f64, precision: Option<usize>) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }
    match precision {
        None => {
            let exp = f.abs().log10().floor() as i32;
            if !(-4..21).contains(&exp) {
                go_exponent(&format!("{:e}", f))
            } else {
                format!("{}", f)
            }
        }
        Some(p) => {
            let p = p.max(1);
            let sci = format!("{:.*e}", p - 1, f);
            let exp: i32 = sci
                .split_once('e')
                .and_then(|(_, e)| e.parse().ok())
                .unwrap_or(0);
            if exp < -4 || exp >= p as i32 {
                let (mantissa, e) = sci.split_once('e').unwrap_or((&sci, "0"));
                go_exponent(&format!("{}e{}", trim_fraction(mantissa), e))
            } else {
                let decimals = (p as i32 - 1 - exp).max(0) as usize;
                trim_fraction(&format!("{:.*}", decimals, f))
            }
        }
    }
}

/// Recover the value rendered by `format` from `input`.
///
/// Returns `None` when the literal text around the verb does not match or
/// the value does not parse.
pub fn scan(format: &str, input: &str) -> Option<Scanned> {
    let pieces = parse(format);
    let verb_at = pieces.iter().position(|p| matches!(p, Piece::Verb(_)));
    let Some(verb_at) = verb_at else {
        return Some(Scanned::Str(input.to_string()));
    };

    let literal = |range: &[Piece]| -> String {
        range
            .iter()
            .filter_map(|p| match p {
                Piece::Literal(s) => Some(s.as_str()),
                Piece::Verb(_) => None,
            })
            .collect()
    };
    let prefix = literal(&pieces[..verb_at]);
    let suffix = literal(&pieces[verb_at + 1..]);
    let body = input.strip_prefix(&prefix)?.strip_suffix(&suffix)?.trim();

    let Piece::Verb(spec) = &pieces[verb_at] else {
        return None;
    };
    match spec.verb {
        'd' => body
            .trim_start_matches('+')
            .parse::<i64>()
            .ok()
            .map(Scanned::Int),
        'x' => i64::from_str_radix(body, 16).ok().map(Scanned::Int),
        'f' | 'F' | 'e' | 'g' => body.parse::<f64>().ok().map(Scanned::Float),
        _ => Some(Scanned::Str(body.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_formats() {
        assert_eq!(sprintf("%d", FormatArg::Int(42)), "42");
        assert_eq!(sprintf("%05d", FormatArg::Int(-42)), "-0042");
        assert_eq!(sprintf("MAT-%03d", FormatArg::UInt(7)), "MAT-007");
        assert_eq!(sprintf("%-4d|", FormatArg::Int(7)), "7   |");
        assert_eq!(sprintf("%x", FormatArg::Int(255)), "ff");
        assert_eq!(sprintf("%+d", FormatArg::Int(3)), "+3");
    }

    #[test]
    fn test_float_formats() {
        assert_eq!(sprintf("%g", FormatArg::Float(3.5)), "3.5");
        assert_eq!(sprintf("%g", FormatArg::Float(100.0)), "100");
        assert_eq!(sprintf("%g", FormatArg::Float(1e21)), "1e+21");
        assert_eq!(sprintf("%g", FormatArg::Float(0.00001)), "1e-05");
        assert_eq!(sprintf("%.3g", FormatArg::Float(3.14159)), "3.14");
        assert_eq!(sprintf("%.2f", FormatArg::Float(2.0)), "2.00");
        assert_eq!(sprintf("%.2f kg", FormatArg::Int(2)), "2.00 kg");
        assert_eq!(sprintf("%e", FormatArg::Float(1234.5)), "1.234500e+03");
    }

    #[test]
    fn test_string_formats() {
        assert_eq!(sprintf("%s", FormatArg::Str("abc")), "abc");
        assert_eq!(sprintf("[%5s]", FormatArg::Str("ab")), "[   ab]");
        assert_eq!(sprintf("%.2s", FormatArg::Str("abcdef")), "ab");
        assert_eq!(sprintf("%v", FormatArg::Bool(true)), "true");
        assert_eq!(sprintf("100%%", FormatArg::Int(1)), "100%");
    }

    #[test]
    fn test_scan_reverses_sprintf() {
        assert_eq!(scan("%d", "42"), Some(Scanned::Int(42)));
        assert_eq!(scan("MAT-%03d", "MAT-007"), Some(Scanned::Int(7)));
        assert_eq!(scan("%g", "3.5"), Some(Scanned::Float(3.5)));
        assert_eq!(scan("%.2f kg", "2.50 kg"), Some(Scanned::Float(2.5)));
        assert_eq!(scan("MAT-%d", "X-1"), None);
        assert_eq!(scan("%d", "abc"), None);
    }
}
