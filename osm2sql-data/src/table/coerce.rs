//! Repair of tag values destined for numeric columns.
//!
//! Integers take the first number, or the truncated average of an `a-b`
//! range. Reals additionally accept a decimal comma and convert values ending
//! in `ft` to metres. Anything unparsable becomes NULL.

const FEET_TO_METRES: f64 = 0.3048;

/// Column storage class derived from a style column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Whole numbers.
    Integer,
    /// Floating point numbers.
    Real,
    /// Free text.
    Text,
}

impl ColumnKind {
    /// Map a style file column type.
    pub fn from_style(column_type: &str) -> Self {
        match column_type.to_ascii_lowercase().as_str() {
            "int4" | "int8" | "int2" | "integer" | "int" | "smallint" | "bigint" => Self::Integer,
            "real" | "float" | "float4" | "float8" | "double" => Self::Real,
            _ => Self::Text,
        }
    }

    /// SQLite type name.
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

/// Parse an integer column value.
pub fn integer(value: &str) -> Option<i64> {
    let (from, rest) = leading_integer(value)?;
    match rest.strip_prefix('-').and_then(leading_integer) {
        Some((to, _)) => from.checked_add(to).map(|sum| sum / 2),
        None => Some(from),
    }
}

/// Parse a real column value.
pub fn real(value: &str) -> Option<f64> {
    let repaired = value.replace(',', ".");
    let feet = repaired.ends_with("ft");
    let (from, rest) = leading_real(&repaired)?;
    let parsed = match rest.strip_prefix('-').and_then(leading_real) {
        Some((to, _)) => (from + to) / 2.0,
        None => from,
    };
    Some(if feet { parsed * FEET_TO_METRES } else { parsed })
}

fn leading_integer(text: &str) -> Option<(i64, &str)> {
    let trimmed = text.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['+', '-']));
    let digits = trimmed
        .get(sign_len..)?
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    let (number, rest) = trimmed.split_at(sign_len + digits);
    number.parse().ok().map(|parsed| (parsed, rest))
}

fn leading_real(text: &str) -> Option<(f64, &str)> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = usize::from(trimmed.starts_with(['+', '-']));
    let int_digits = count_digits(bytes, end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(bytes, end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = count_digits(bytes, end + 1 + sign);
        if exp_digits > 0 {
            end += 1 + sign + exp_digits;
        }
    }
    let (number, rest) = trimmed.split_at(end);
    number
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .map(|parsed| (parsed, rest))
}

fn count_digits(bytes: &[u8], start: usize) -> usize {
    bytes
        .get(start..)
        .map_or(0, |tail| tail.iter().take_while(|b| b.is_ascii_digit()).count())
}
