use std::fmt;

#[derive(Clone, Debug)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObject),
}

impl JsValue {
    pub const TRUE: JsValue = JsValue::Boolean(true);
    pub const FALSE: JsValue = JsValue::Boolean(false);
    pub const ZERO: JsValue = JsValue::Number(0.0);
    pub const NAN: JsValue = JsValue::Number(f64::NAN);
    pub const INFINITY: JsValue = JsValue::Number(f64::INFINITY);
    pub const NEG_INFINITY: JsValue = JsValue::Number(f64::NEG_INFINITY);
    pub const EMPTY_STRING: JsValue = JsValue::String(JsString::EMPTY);

    pub fn string(s: &str) -> Self {
        JsValue::String(JsString::from_str(s))
    }
}

// UTF-16 code unit string (ECMA-262 §6.1.4)
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct JsString {
    pub code_units: Vec<u16>,
}

impl JsString {
    pub const EMPTY: JsString = JsString {
        code_units: Vec::new(),
    };

    pub fn from_str(s: &str) -> Self {
        Self {
            code_units: s.encode_utf16().collect(),
        }
    }

    pub fn from_code_units(code_units: Vec<u16>) -> Self {
        Self { code_units }
    }

    pub fn is_empty(&self) -> bool {
        self.code_units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.code_units.len()
    }

    pub fn push_char(&mut self, ch: char) {
        let mut buf = [0u16; 2];
        self.code_units.extend_from_slice(ch.encode_utf16(&mut buf));
    }

    pub fn push_str(&mut self, s: &str) {
        self.code_units.extend(s.encode_utf16());
    }

    pub fn append(&mut self, other: &JsString) {
        self.code_units.extend_from_slice(&other.code_units);
    }

    pub fn to_rust_string(&self) -> String {
        String::from_utf16_lossy(&self.code_units)
    }

    /// `None` when the string holds a lone surrogate.
    pub fn to_well_formed_string(&self) -> Option<String> {
        String::from_utf16(&self.code_units).ok()
    }

    /// Lossless byte form: paired surrogates become one 4-byte sequence, lone
    /// surrogates keep their own 3-byte sequence (WTF-8).
    pub fn to_wtf8(&self) -> Vec<u8> {
        let units = &self.code_units;
        let mut out = Vec::with_capacity(units.len());
        let mut i = 0;
        while i < units.len() {
            let unit = units[i];
            let cp = if is_high_surrogate(unit)
                && let Some(&low) = units.get(i + 1)
                && is_low_surrogate(low)
            {
                i += 1;
                combine_surrogates(unit, low)
            } else {
                u32::from(unit)
            };
            encode_generalized_utf8(cp, &mut out);
            i += 1;
        }
        out
    }

    /// Inverse of [`JsString::to_wtf8`]. Malformed sequences decode to U+FFFD.
    pub fn from_wtf8(bytes: &[u8]) -> Self {
        let mut units = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            let b0 = bytes[i];
            let (len, init) = match b0 {
                0x00..=0x7F => (1, u32::from(b0)),
                0xC2..=0xDF => (2, u32::from(b0 & 0x1F)),
                0xE0..=0xEF => (3, u32::from(b0 & 0x0F)),
                0xF0..=0xF4 => (4, u32::from(b0 & 0x07)),
                _ => {
                    units.push(0xFFFD);
                    i += 1;
                    continue;
                }
            };
            let Some(tail) = bytes.get(i + 1..i + len) else {
                units.push(0xFFFD);
                break;
            };
            if tail.iter().any(|b| b & 0xC0 != 0x80) {
                units.push(0xFFFD);
                i += 1;
                continue;
            }
            let cp = tail
                .iter()
                .fold(init, |acc, b| (acc << 6) | u32::from(b & 0x3F));
            match char::from_u32(cp) {
                Some(ch) => {
                    let mut buf = [0u16; 2];
                    units.extend_from_slice(ch.encode_utf16(&mut buf));
                }
                // 0xD800..=0xDFFF: a lone surrogate written by to_wtf8
                None if cp <= 0xFFFF => units.push(cp as u16),
                None => units.push(0xFFFD),
            }
            i += len;
        }
        Self { code_units: units }
    }

    /// Canonical array index when this string is one.
    pub fn array_index(&self) -> Option<usize> {
        String::from_utf16(&self.code_units)
            .ok()
            .and_then(|s| number_ops::array_index(&s))
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rust_string())
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString::from_str(s)
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString::from_str(&s)
    }
}

impl From<&String> for JsString {
    fn from(s: &String) -> Self {
        JsString::from_str(s)
    }
}

impl From<&JsString> for JsString {
    fn from(s: &JsString) -> Self {
        s.clone()
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.code_units.iter().copied().eq(other.encode_utf16())
    }
}

pub fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

pub fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

pub fn combine_surrogates(high: u16, low: u16) -> u32 {
    0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00)
}

fn encode_generalized_utf8(cp: u32, out: &mut Vec<u8>) {
    match cp {
        0..=0x7F => out.push(cp as u8),
        0x80..=0x7FF => {
            out.push(0xC0 | (cp >> 6) as u8);
            out.push(0x80 | (cp & 0x3F) as u8);
        }
        0x800..=0xFFFF => {
            out.push(0xE0 | (cp >> 12) as u8);
            out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
            out.push(0x80 | (cp & 0x3F) as u8);
        }
        _ => {
            out.push(0xF0 | (cp >> 18) as u8);
            out.push(0x80 | ((cp >> 12) & 0x3F) as u8);
            out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
            out.push(0x80 | (cp & 0x3F) as u8);
        }
    }
}

#[derive(Clone, Debug)]
pub struct JsSymbol {
    pub id: u64,
    pub description: Option<JsString>,
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl JsSymbol {
    /// Property key under which this symbol stores values. The id keeps
    /// symbols with equal descriptions apart.
    pub fn to_property_key(&self) -> JsString {
        let mut key = JsString::from_str("Symbol(");
        if let Some(desc) = &self.description {
            key.append(desc);
        }
        key.push_str(&format!(")#{}", self.id));
        key
    }
}

/// Handle to an object living in a [`crate::runtime::Realm`]'s heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JsObject {
    pub id: u64,
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsValue::Null)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, JsValue::Boolean(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, JsValue::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, JsValue::String(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, JsValue::Symbol(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, JsValue::Number(n) if n.is_nan())
    }

    pub fn as_object(&self) -> Option<JsObject> {
        match self {
            JsValue::Object(o) => Some(*o),
            _ => None,
        }
    }
}

// §6.1.6.1 Number type operations
pub mod number_ops {
    pub fn equal(x: f64, y: f64) -> bool {
        if x.is_nan() || y.is_nan() {
            return false;
        }
        x == y
    }

    pub fn same_value(x: f64, y: f64) -> bool {
        if x.is_nan() && y.is_nan() {
            return true;
        }
        if x == 0.0 && y == 0.0 {
            return x.is_sign_positive() == y.is_sign_positive();
        }
        x == y
    }

    pub fn same_value_zero(x: f64, y: f64) -> bool {
        if x.is_nan() && y.is_nan() {
            return true;
        }
        x == y
    }

    /// Shortest round-trip digits laid out positionally, never with an
    /// exponent: `1e21` prints as `1000000000000000000000`.
    pub fn to_string(x: f64) -> String {
        if x.is_nan() {
            return "NaN".to_string();
        }
        if x == 0.0 {
            return "0".to_string();
        }
        if x.is_infinite() {
            return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
        }
        let mut buf = ryu_js::Buffer::new();
        let shortest = buf.format(x);
        let Some((mantissa, exponent)) = shortest.split_once('e') else {
            return shortest.to_string();
        };
        let Ok(exponent) = exponent.parse::<i64>() else {
            return shortest.to_string();
        };
        let (sign, mantissa) = match mantissa.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", mantissa),
        };
        let int_len = mantissa.find('.').unwrap_or(mantissa.len()) as i64;
        let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
        let point = int_len + exponent;
        let len = digits.len() as i64;
        let mut out = String::from(sign);
        if point <= 0 {
            out.push_str("0.");
            out.push_str(&"0".repeat((-point) as usize));
            out.push_str(&digits);
        } else if point >= len {
            out.push_str(&digits);
            out.push_str(&"0".repeat((point - len) as usize));
        } else {
            let (whole, frac) = digits.split_at(point as usize);
            out.push_str(whole);
            out.push('.');
            out.push_str(frac);
        }
        out
    }

    /// Canonical array index (§6.1.7) for a property key, if it is one.
    pub fn array_index(key: &str) -> Option<usize> {
        if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
            return None;
        }
        if !key.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        key.parse::<u32>()
            .ok()
            .filter(|&n| n != u32::MAX)
            .map(|n| n as usize)
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{b}"),
            JsValue::Number(n) => write!(f, "{}", number_ops::to_string(*n)),
            JsValue::String(s) => write!(f, "{s}"),
            JsValue::Symbol(s) => {
                if let Some(desc) = &s.description {
                    write!(f, "Symbol({desc})")
                } else {
                    write!(f, "Symbol()")
                }
            }
            JsValue::Object(_) => write!(f, "[object Object]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wtf8_keeps_lone_surrogate() {
        let lone = JsString::from_code_units(vec![0xD800]);
        let bytes = lone.to_wtf8();
        assert_eq!(bytes, vec![0xED, 0xA0, 0x80]);
        assert_eq!(JsString::from_wtf8(&bytes), lone);
    }

    #[test]
    fn wtf8_pairs_surrogates_into_four_bytes() {
        let pair = JsString::from_code_units(vec![0xD83D, 0xDE00]);
        let bytes = pair.to_wtf8();
        assert_eq!(bytes, "😀".as_bytes());
        assert_eq!(JsString::from_wtf8(&bytes), pair);
    }

    #[test]
    fn wtf8_malformed_bytes_become_replacement() {
        let s = JsString::from_wtf8(&[b'a', 0xFF, b'b']);
        assert_eq!(s.to_rust_string(), "a\u{FFFD}b");
    }

    #[test]
    fn number_special_values() {
        assert_eq!(number_ops::to_string(f64::NAN), "NaN");
        assert_eq!(number_ops::to_string(0.0), "0");
        assert_eq!(number_ops::to_string(-0.0), "0");
        assert_eq!(number_ops::to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_ops::to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_ops::to_string(0.1), "0.1");
        assert_eq!(number_ops::to_string(1.5), "1.5");
        assert_eq!(number_ops::to_string(-42.0), "-42");
    }

    #[test]
    fn numbers_print_without_exponent() {
        assert_eq!(number_ops::to_string(1e21), "1000000000000000000000");
        assert_eq!(number_ops::to_string(1e-7), "0.0000001");
        assert_eq!(number_ops::to_string(-1.5e-10), "-0.00000000015");
        assert_eq!(number_ops::to_string(1.2345e25), "12345000000000000000000000");
        assert_eq!(number_ops::to_string(123.456), "123.456");
        assert_eq!(number_ops::to_string(5e-324).len(), "0.".len() + 323 + 1);
        let big = number_ops::to_string(f64::MAX);
        assert_eq!(big.len(), 309);
        assert_eq!(big.parse::<f64>().unwrap(), f64::MAX);
    }

    #[test]
    fn number_same_value() {
        assert!(number_ops::same_value(f64::NAN, f64::NAN));
        assert!(!number_ops::same_value(0.0, -0.0));
        assert!(number_ops::same_value(0.0, 0.0));
        assert!(number_ops::same_value_zero(0.0, -0.0));
        assert!(!number_ops::equal(f64::NAN, f64::NAN));
    }

    #[test]
    fn array_index_keys() {
        assert_eq!(number_ops::array_index("0"), Some(0));
        assert_eq!(number_ops::array_index("42"), Some(42));
        assert_eq!(number_ops::array_index("01"), None);
        assert_eq!(number_ops::array_index("-1"), None);
        assert_eq!(number_ops::array_index("length"), None);
        assert_eq!(number_ops::array_index("4294967295"), None);
    }

    #[test]
    fn symbols_compare_by_identity() {
        let a = JsSymbol {
            id: 1,
            description: Some(JsString::from_str("tag")),
        };
        let b = JsSymbol {
            id: 2,
            description: Some(JsString::from_str("tag")),
        };
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a.to_property_key(), b.to_property_key());
        assert_eq!(a.to_property_key(), "Symbol(tag)#1");
    }

    #[test]
    fn lone_surrogates_stay_distinct() {
        let high = JsString::from_code_units(vec![0xD800]);
        let other = JsString::from_code_units(vec![0xDBFF]);
        assert_ne!(high, other);
        assert_eq!(high.to_rust_string(), other.to_rust_string());
        assert_eq!(high.to_well_formed_string(), None);
        assert_eq!(JsString::from("ok").to_well_formed_string().as_deref(), Some("ok"));
    }

    #[test]
    fn string_array_index() {
        assert_eq!(JsString::from("7").array_index(), Some(7));
        assert_eq!(JsString::from("07").array_index(), None);
        assert_eq!(JsString::from_code_units(vec![0x31, 0xD800]).array_index(), None);
    }

    #[test]
    fn display_values() {
        assert_eq!(format!("{}", JsValue::Undefined), "undefined");
        assert_eq!(format!("{}", JsValue::Null), "null");
        assert_eq!(format!("{}", JsValue::TRUE), "true");
        assert_eq!(format!("{}", JsValue::Number(42.0)), "42");
        assert_eq!(format!("{}", JsValue::string("hi")), "hi");
    }
}
