use super::*;

/// Hint passed to [`Realm::to_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    String,
    Number,
    Default,
}

// §7.1.2 ToBoolean
pub fn to_boolean(val: &JsValue) -> bool {
    match val {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
        JsValue::String(s) => !s.is_empty(),
        JsValue::Symbol(_) | JsValue::Object(_) => true,
    }
}

/// §7.1.4 ToNumber for primitives. Objects and symbols give NaN; use
/// [`Realm::to_number_value`] when objects must be unwrapped first.
pub fn to_number(val: &JsValue) -> f64 {
    match val {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => *b as u8 as f64,
        JsValue::Number(n) => *n,
        JsValue::String(s) => string_to_number(s),
        JsValue::Symbol(_) | JsValue::Object(_) => f64::NAN,
    }
}

// WhiteSpace and LineTerminator; U+0085 is Unicode whitespace but not JS
fn is_js_whitespace(c: char) -> bool {
    (c.is_whitespace() && c != '\u{85}') || c == '\u{FEFF}'
}

// §7.1.4.1.1 StringToNumber
pub fn string_to_number(s: &JsString) -> f64 {
    let text = s.to_rust_string();
    let trimmed = text.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => 10,
    };
    if radix != 10 {
        return parse_radix_digits(&trimmed[2..], radix);
    }
    if !is_decimal_literal(trimmed) {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_radix_digits(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut acc = 0.0;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => acc = acc * f64::from(radix) + f64::from(d),
            None => return f64::NAN,
        }
    }
    acc
}

// StrDecimalLiteral without the Infinity forms: sign, digits with at most
// one '.', at least one digit, optional exponent
fn is_decimal_literal(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if int_part.is_empty() && frac_part.is_empty() {
        return false;
    }
    if !all_digits(int_part) || !all_digits(frac_part) {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !digits.is_empty() && all_digits(digits)
        }
    }
}

// §7.2.15 IsStrictlyEqual
pub fn strict_equality(left: &JsValue, right: &JsValue) -> bool {
    match (left, right) {
        (JsValue::Undefined, JsValue::Undefined) => true,
        (JsValue::Null, JsValue::Null) => true,
        (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
        (JsValue::Number(a), JsValue::Number(b)) => number_ops::equal(*a, *b),
        (JsValue::String(a), JsValue::String(b)) => a == b,
        (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
        (JsValue::Object(a), JsValue::Object(b)) => a == b,
        _ => false,
    }
}

pub fn same_value(left: &JsValue, right: &JsValue) -> bool {
    match (left, right) {
        (JsValue::Number(a), JsValue::Number(b)) => number_ops::same_value(*a, *b),
        _ => strict_equality(left, right),
    }
}

pub fn same_value_zero(left: &JsValue, right: &JsValue) -> bool {
    match (left, right) {
        (JsValue::Number(a), JsValue::Number(b)) => number_ops::same_value_zero(*a, *b),
        _ => strict_equality(left, right),
    }
}

/// §7.2.14 IsLooselyEqual restricted to primitives. Each coercion step
/// bumps `depth`; comparisons still unresolved after two steps are false.
pub fn loose_primitive_equality(left: &JsValue, right: &JsValue, depth: u8) -> bool {
    if std::mem::discriminant(left) == std::mem::discriminant(right) {
        return strict_equality(left, right);
    }
    if left.is_nullish() && right.is_nullish() {
        return true;
    }
    if depth >= 2 {
        return false;
    }
    let depth = depth + 1;
    match (left, right) {
        (JsValue::Number(_), JsValue::String(s)) => {
            loose_primitive_equality(left, &JsValue::Number(string_to_number(s)), depth)
        }
        (JsValue::String(s), JsValue::Number(_)) => {
            loose_primitive_equality(&JsValue::Number(string_to_number(s)), right, depth)
        }
        (JsValue::Boolean(_), _) => {
            loose_primitive_equality(&JsValue::Number(to_number(left)), right, depth)
        }
        (_, JsValue::Boolean(_)) => {
            loose_primitive_equality(left, &JsValue::Number(to_number(right)), depth)
        }
        _ => false,
    }
}

impl Realm {
    pub fn typeof_val(&self, val: &JsValue) -> &'static str {
        match val {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(_) if self.is_callable(val) => "function",
            JsValue::Object(_) => "object",
        }
    }

    /// §7.2.14 IsLooselyEqual. An object compared against a non-nullish
    /// primitive is first converted with [`Realm::to_primitive`].
    pub fn abstract_equality(&mut self, left: &JsValue, right: &JsValue) -> Result<bool, JsError> {
        match (left, right) {
            (JsValue::Object(_), prim) if !prim.is_object() && !prim.is_nullish() => {
                let left = self.to_primitive(left, PreferredType::Default)?;
                Ok(loose_primitive_equality(&left, right, 0))
            }
            (prim, JsValue::Object(_)) if !prim.is_object() && !prim.is_nullish() => {
                let right = self.to_primitive(right, PreferredType::Default)?;
                Ok(loose_primitive_equality(left, &right, 0))
            }
            _ => Ok(loose_primitive_equality(left, right, 0)),
        }
    }

    /// §7.1.1 ToPrimitive without `@@toPrimitive`: tries `valueOf` and
    /// `toString` in hint order. Objects with neither method fall back to
    /// the built-in rendering (error, array, function, plain object).
    pub fn to_primitive(&mut self, val: &JsValue, hint: PreferredType) -> Result<JsValue, JsError> {
        let JsValue::Object(obj) = val else {
            return Ok(val.clone());
        };
        let methods = match hint {
            PreferredType::String => ["toString", "valueOf"],
            PreferredType::Number | PreferredType::Default => ["valueOf", "toString"],
        };
        let mut found_callable = false;
        for name in methods {
            let method = self.get(*obj, name)?;
            if !self.is_callable(&method) {
                continue;
            }
            found_callable = true;
            let result = self.call(&method, val, &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
        if found_callable {
            return Err(JsError::type_error("Cannot convert object to primitive value"));
        }
        Ok(JsValue::String(self.default_object_string(*obj)?))
    }

    // §7.1.17 ToString
    pub fn to_string(&mut self, val: &JsValue) -> Result<JsString, JsError> {
        match val {
            JsValue::String(s) => Ok(s.clone()),
            JsValue::Symbol(_) => Err(JsError::type_error(
                "Cannot convert a Symbol value to a string",
            )),
            JsValue::Object(_) => {
                let prim = self.to_primitive(val, PreferredType::String)?;
                self.to_string(&prim)
            }
            other => Ok(JsString::from_str(&other.to_string())),
        }
    }

    /// ToNumber that unwraps objects through [`Realm::to_primitive`].
    pub fn to_number_value(&mut self, val: &JsValue) -> Result<f64, JsError> {
        match val {
            JsValue::Symbol(_) => Err(JsError::type_error(
                "Cannot convert a Symbol value to a number",
            )),
            JsValue::Object(_) => {
                let prim = self.to_primitive(val, PreferredType::Number)?;
                self.to_number_value(&prim)
            }
            other => Ok(to_number(other)),
        }
    }

    // §7.1.19 ToPropertyKey; string keys keep every code unit
    pub fn to_property_key(&mut self, val: &JsValue) -> Result<JsString, JsError> {
        let prim = self.to_primitive(val, PreferredType::String)?;
        match &prim {
            JsValue::Symbol(sym) => Ok(sym.to_property_key()),
            other => self.to_string(other),
        }
    }

    fn default_object_string(&mut self, obj: JsObject) -> Result<JsString, JsError> {
        let (kind, function_name, is_array) = {
            let data = self.object(obj)?;
            let data = data.borrow();
            (
                data.kind,
                data.callable.as_ref().map(|f| f.name.clone()),
                data.array_elements.is_some(),
            )
        };
        if kind == ObjectKind::Error {
            return self.error_to_string(obj);
        }
        if is_array {
            if self.join_stack.contains(&obj) {
                return Ok(JsString::EMPTY);
            }
            self.join_stack.push(obj);
            let joined = self.join_elements(obj);
            self.join_stack.pop();
            return joined;
        }
        if let Some(name) = function_name {
            return Ok(JsString::from_str(&format!(
                "function {name}() {{ [native code] }}"
            )));
        }
        Ok(JsString::from_str("[object Object]"))
    }

    // `name: message`, omitting whichever part is empty
    fn error_to_string(&mut self, obj: JsObject) -> Result<JsString, JsError> {
        let name = match self.get(obj, "name")? {
            JsValue::Undefined => JsString::from_str("Error"),
            other => self.to_string(&other)?,
        };
        let message = match self.get(obj, "message")? {
            JsValue::Undefined => JsString::EMPTY,
            other => self.to_string(&other)?,
        };
        if name.is_empty() {
            return Ok(message);
        }
        if message.is_empty() {
            return Ok(name);
        }
        let mut out = name;
        out.push_str(": ");
        out.append(&message);
        Ok(out)
    }

    fn join_elements(&mut self, arr: JsObject) -> Result<JsString, JsError> {
        let len = match self.get(arr, "length")? {
            JsValue::Number(n) if n > 0.0 => n as usize,
            _ => 0,
        };
        let mut out = JsString::EMPTY;
        for i in 0..len {
            if i > 0 {
                out.push_char(',');
            }
            let elem = self.get(arr, &i.to_string())?;
            if !elem.is_nullish() {
                let s = self.to_string(&elem)?;
                out.append(&s);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> f64 {
        string_to_number(&JsString::from_str(s))
    }

    #[test]
    fn falsy_values() {
        for v in [
            JsValue::Undefined,
            JsValue::Null,
            JsValue::FALSE,
            JsValue::NAN,
            JsValue::ZERO,
            JsValue::Number(-0.0),
            JsValue::EMPTY_STRING,
        ] {
            assert!(!to_boolean(&v), "{v:?} should be falsy");
        }
        assert!(to_boolean(&JsValue::string("0")));
        assert!(to_boolean(&JsValue::Number(-1.0)));
    }

    #[test]
    fn string_to_number_accepts_numeric_literals() {
        assert_eq!(num("  42  "), 42.0);
        assert_eq!(num(""), 0.0);
        assert_eq!(num(" \n\t"), 0.0);
        assert_eq!(num("0x1F"), 31.0);
        assert_eq!(num("0o17"), 15.0);
        assert_eq!(num("0b101"), 5.0);
        assert_eq!(num("1e3"), 1000.0);
        assert_eq!(num("-2.5E-1"), -0.25);
        assert_eq!(num(".5"), 0.5);
        assert_eq!(num("5."), 5.0);
        assert_eq!(num("\u{FEFF}7\u{2028}"), 7.0);
        assert_eq!(num("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(num("+Infinity"), f64::INFINITY);
    }

    #[test]
    fn malformed_numeric_strings_are_nan() {
        for s in [
            "inf", "infinity", "NaN", "nan", "1_000", "0x", "-0x10", "0b2", ".", "e5", "1e",
            "1.2.3", "12px", "\u{85}7",
        ] {
            assert!(num(s).is_nan(), "{s:?} should be NaN");
        }
    }

    #[test]
    fn strict_equality_never_coerces() {
        assert!(!strict_equality(&JsValue::Number(1.0), &JsValue::string("1")));
        assert!(!strict_equality(&JsValue::NAN, &JsValue::NAN));
        assert!(strict_equality(&JsValue::Number(0.0), &JsValue::Number(-0.0)));
        assert!(!strict_equality(&JsValue::Null, &JsValue::Undefined));
    }

    #[test]
    fn same_value_distinguishes_zeroes() {
        assert!(!same_value(&JsValue::Number(0.0), &JsValue::Number(-0.0)));
        assert!(same_value(&JsValue::NAN, &JsValue::NAN));
        assert!(same_value_zero(&JsValue::Number(0.0), &JsValue::Number(-0.0)));
    }

    #[test]
    fn loose_equality_ladder() {
        let mut realm = Realm::new();
        let cases = [
            (JsValue::Number(1.0), JsValue::string("1"), true),
            (JsValue::NAN, JsValue::NAN, false),
            (JsValue::Null, JsValue::Undefined, true),
            (JsValue::Null, JsValue::ZERO, false),
            (JsValue::Undefined, JsValue::FALSE, false),
            (JsValue::EMPTY_STRING, JsValue::FALSE, true),
            (JsValue::TRUE, JsValue::string("1"), true),
            (JsValue::string("0x10"), JsValue::Number(16.0), true),
            (JsValue::string("a"), JsValue::string("a"), true),
        ];
        for (a, b, expected) in cases {
            assert_eq!(realm.abstract_equality(&a, &b).unwrap(), expected, "{a:?} == {b:?}");
            assert_eq!(realm.abstract_equality(&b, &a).unwrap(), expected, "{b:?} == {a:?}");
        }
    }

    #[test]
    fn objects_compare_through_to_primitive() {
        let mut realm = Realm::new();
        let obj = realm.create_object();
        let to_string = realm.create_function(JsFunction::native("toString", 0, |_, _, _| {
            Ok(JsValue::string("custom"))
        }));
        realm.set(obj, "toString", JsValue::Object(to_string)).unwrap();
        let obj = JsValue::Object(obj);
        assert!(realm.abstract_equality(&obj, &JsValue::string("custom")).unwrap());
        assert!(!realm.abstract_equality(&obj, &JsValue::Null).unwrap());
        assert!(realm.abstract_equality(&obj, &obj).unwrap());
        assert_eq!(realm.to_string(&obj).unwrap().to_string(), "custom");
    }

    #[test]
    fn non_primitive_conversion_result_is_type_error() {
        let mut realm = Realm::new();
        let obj = realm.create_object();
        let to_string = realm.create_function(JsFunction::native("toString", 0, |_, this, _| {
            Ok(this.clone())
        }));
        realm.set(obj, "toString", JsValue::Object(to_string)).unwrap();
        assert!(matches!(
            realm.to_string(&JsValue::Object(obj)),
            Err(JsError::TypeError(_))
        ));
    }

    #[test]
    fn error_objects_render_name_and_message() {
        let mut realm = Realm::new();
        let err = realm.create_error(ErrorKind::RangeError, "too big");
        assert_eq!(realm.to_string(&JsValue::Object(err)).unwrap().to_string(), "RangeError: too big");

        let bare = realm.create_error(ErrorKind::TypeError, "");
        assert_eq!(realm.to_string(&JsValue::Object(bare)).unwrap().to_string(), "TypeError");

        let nameless = realm.create_error(ErrorKind::Error, "only message");
        realm.set(nameless, "name", JsValue::EMPTY_STRING).unwrap();
        assert_eq!(
            realm.to_string(&JsValue::Object(nameless)).unwrap().to_string(),
            "only message"
        );

        let orphan = realm.create_object_of_kind(ObjectKind::Error, None);
        assert_eq!(realm.to_string(&JsValue::Object(orphan)).unwrap().to_string(), "Error");
    }

    #[test]
    fn arrays_join_and_survive_cycles() {
        let mut realm = Realm::new();
        let arr = realm.create_array(vec![JsValue::Number(1.0), JsValue::Null, JsValue::string("a")]);
        assert_eq!(realm.to_string(&JsValue::Object(arr)).unwrap().to_string(), "1,,a");

        let cyclic = realm.create_array(vec![JsValue::Number(1.0)]);
        realm.set(cyclic, "1", JsValue::Object(cyclic)).unwrap();
        assert_eq!(realm.to_string(&JsValue::Object(cyclic)).unwrap().to_string(), "1,");
    }

    #[test]
    fn plain_objects_and_functions() {
        let mut realm = Realm::new();
        let obj = realm.create_object();
        assert_eq!(realm.to_string(&JsValue::Object(obj)).unwrap().to_string(), "[object Object]");
        let f = realm.create_function(JsFunction::native("add", 2, |_, _, _| Ok(JsValue::Undefined)));
        assert_eq!(
            realm.to_string(&JsValue::Object(f)).unwrap().to_string(),
            "function add() { [native code] }"
        );
    }

    #[test]
    fn symbols_refuse_string_coercion() {
        let mut realm = Realm::new();
        let sym = JsValue::Symbol(realm.new_symbol(Some("s")));
        assert!(matches!(realm.to_string(&sym), Err(JsError::TypeError(_))));
        assert!(realm.to_number_value(&sym).is_err());
        let key = realm.to_property_key(&sym).unwrap().to_rust_string();
        assert!(key.starts_with("Symbol(s)"));
        assert!(to_number(&sym).is_nan());
    }

    #[test]
    fn primitive_to_string() {
        let mut realm = Realm::new();
        assert_eq!(realm.to_string(&JsValue::Number(0.1)).unwrap().to_string(), "0.1");
        assert_eq!(realm.to_string(&JsValue::Number(-0.0)).unwrap().to_string(), "0");
        assert_eq!(realm.to_string(&JsValue::Undefined).unwrap().to_string(), "undefined");
        assert_eq!(realm.to_property_key(&JsValue::Number(3.0)).unwrap(), "3");
        assert_eq!(realm.to_string(&JsValue::Number(1e21)).unwrap(), "1000000000000000000000");
        assert_eq!(realm.to_string(&JsValue::Number(1e-7)).unwrap(), "0.0000001");
    }

    #[test]
    fn property_keys_keep_lone_surrogates() {
        let mut realm = Realm::new();
        let high = JsValue::String(JsString::from_code_units(vec![0xD800]));
        let other = JsValue::String(JsString::from_code_units(vec![0xDBFF]));
        let k1 = realm.to_property_key(&high).unwrap();
        let k2 = realm.to_property_key(&other).unwrap();
        assert_ne!(k1, k2);
        assert_eq!(k1.code_units, vec![0xD800]);

        let o = realm.create_object();
        realm.set(o, &k1, JsValue::Number(1.0)).unwrap();
        assert!(realm.get(o, &k2).unwrap().is_undefined());
        assert_eq!(realm.own_keys(o).unwrap(), vec![k1]);
    }

    #[test]
    fn typeof_reports_functions() {
        let mut realm = Realm::new();
        let obj = realm.create_object();
        let f = realm.create_function(JsFunction::native("f", 0, |_, _, _| Ok(JsValue::Undefined)));
        assert_eq!(realm.typeof_val(&JsValue::Null), "object");
        assert_eq!(realm.typeof_val(&JsValue::Object(obj)), "object");
        assert_eq!(realm.typeof_val(&JsValue::Object(f)), "function");
        assert_eq!(realm.typeof_val(&JsValue::string("")), "string");
    }
}
