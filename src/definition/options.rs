//! Option lists for fields and relationships.
//!
//! The interchange format carries options either as a comma-separated `key=value` string
//! (`max_length=100,unique=True`) or as a JSON object. Both are read into [`RawOptions`];
//! typed interpretation happens in the validator. Output is always the canonical string
//! form: keys sorted, values rendered as target-language literals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options as they appear in the interchange JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsSchema {
    Text(String),
    Map(Map<String, Value>),
}

impl Default for OptionsSchema {
    fn default() -> Self {
        OptionsSchema::Text(String::new())
    }
}

impl OptionsSchema {
    pub fn is_empty(&self) -> bool {
        match self {
            OptionsSchema::Text(s) => s.trim().is_empty(),
            OptionsSchema::Map(m) => m.is_empty(),
        }
    }

    /// Build the canonical string form from (key, literal) pairs.
    pub fn canonical(mut pairs: Vec<(String, String)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let joined = pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        OptionsSchema::Text(joined)
    }

    pub fn parse(&self) -> Result<RawOptions, String> {
        match self {
            OptionsSchema::Text(s) => parse_options_str(s),
            OptionsSchema::Map(m) => Ok(RawOptions(
                m.iter()
                    .map(|(k, v)| (k.trim().to_string(), OptionValue::Json(v.clone())))
                    .collect(),
            )),
        }
    }
}

/// One option value before typing: a source literal from the string form, or a JSON value.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Literal(String),
    Json(Value),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Literal(s) => match s.as_str() {
                "True" | "true" | "1" => Some(true),
                "False" | "false" | "0" => Some(false),
                _ => None,
            },
            OptionValue::Json(Value::Bool(b)) => Some(*b),
            OptionValue::Json(Value::String(s)) => OptionValue::Literal(s.clone()).as_bool(),
            OptionValue::Json(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            OptionValue::Literal(s) => s.parse().ok(),
            OptionValue::Json(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            OptionValue::Json(Value::String(s)) => s.trim().parse().ok(),
            OptionValue::Json(_) => None,
        }
    }

    /// Text content: quoted literals are unquoted, bare literals taken as-is.
    pub fn as_text(&self) -> Option<String> {
        match self {
            OptionValue::Literal(s) => Some(unquote(s).unwrap_or_else(|| s.clone())),
            OptionValue::Json(Value::String(s)) => Some(s.clone()),
            OptionValue::Json(Value::Number(n)) => Some(n.to_string()),
            OptionValue::Json(_) => None,
        }
    }

    /// The literal exactly as written (for symbols such as `models.CASCADE` and numbers).
    pub fn as_symbol(&self) -> Option<String> {
        match self {
            OptionValue::Literal(s) => Some(unquote(s).unwrap_or_else(|| s.clone())),
            OptionValue::Json(Value::String(s)) => Some(s.clone()),
            OptionValue::Json(Value::Number(n)) => Some(n.to_string()),
            OptionValue::Json(Value::Bool(b)) => Some(if *b { "True".into() } else { "False".into() }),
            OptionValue::Json(_) => None,
        }
    }

    /// True for a quoted source literal or a JSON string; used to keep `'12'` as text.
    pub fn is_quoted(&self) -> bool {
        match self {
            OptionValue::Literal(s) => unquote(s).is_some(),
            OptionValue::Json(Value::String(_)) => true,
            OptionValue::Json(_) => false,
        }
    }
}

/// Ordered (key, value) pairs as supplied; duplicates are preserved so the validator can report them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawOptions(pub Vec<(String, OptionValue)>);

impl RawOptions {
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

/// Parse `key=value,key2=value2`. Commas inside quotes or brackets do not split.
pub fn parse_options_str(s: &str) -> Result<RawOptions, String> {
    let mut out = Vec::new();
    for part in split_top_level(s)? {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| format!("option '{}' is not a key=value pair", part))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("option '{}' has an empty key", part));
        }
        out.push((key.to_string(), OptionValue::Literal(value.trim().to_string())));
    }
    Ok(RawOptions(out))
}

fn split_top_level(s: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in s.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("unbalanced '{}' in options", c));
                }
                current.push(c);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if quote.is_some() {
        return Err("unterminated quote in options".into());
    }
    if depth != 0 {
        return Err("unbalanced brackets in options".into());
    }
    parts.push(current);
    Ok(parts)
}

/// Strip one level of matching single or double quotes, resolving backslash escapes.
/// `None` unless the whole input is one quoted string.
pub(crate) fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    let first = s.chars().next()?;
    if (first != '\'' && first != '"') || s.len() < 2 || !s.ends_with(first) {
        return None;
    }
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let code = u8::from_str_radix(&hex, 16).ok().filter(|_| hex.len() == 2)?;
                    out.push(char::from(code));
                }
                Some(other) => out.push(other),
                None => return None,
            }
        } else if c == first {
            return None;
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_top_level_commas_only() {
        let raw = parse_options_str("max_length=100, default='a,b', choices=[(1, 'x')]").unwrap();
        assert_eq!(raw.0.len(), 3);
        assert_eq!(raw.get("default").and_then(|v| v.as_text()).as_deref(), Some("a,b"));
        assert_eq!(raw.get("max_length").and_then(|v| v.as_u32()), Some(100));
    }

    #[test]
    fn empty_string_has_no_options() {
        assert!(parse_options_str("").unwrap().0.is_empty());
        assert!(parse_options_str(" , ").unwrap().0.is_empty());
    }

    #[test]
    fn rejects_pairs_without_equals_and_open_quotes() {
        assert!(parse_options_str("unique").is_err());
        assert!(parse_options_str("default='abc").is_err());
        assert!(parse_options_str("default=[1,2").is_err());
    }

    #[test]
    fn escaped_quotes_survive_unquoting() {
        let raw = parse_options_str(r"default='it\'s'").unwrap();
        assert_eq!(raw.get("default").and_then(|v| v.as_text()).as_deref(), Some("it's"));
        assert!(raw.get("default").map(|v| v.is_quoted()).unwrap_or(false));
    }

    #[test]
    fn unquote_takes_exactly_one_string() {
        assert_eq!(unquote("'a b'").as_deref(), Some("a b"));
        assert_eq!(unquote(r"'a\rb\x07'").as_deref(), Some("a\rb\u{7}"));
        assert_eq!(unquote("'a' + 'b'"), None);
        assert_eq!(unquote(r"'a\'"), None);
        assert_eq!(unquote("plain"), None);
    }

    #[test]
    fn canonical_form_sorts_keys() {
        let c = OptionsSchema::canonical(vec![
            ("unique".into(), "True".into()),
            ("max_length".into(), "10".into()),
        ]);
        assert_eq!(c, OptionsSchema::Text("max_length=10,unique=True".into()));
    }

    #[test]
    fn json_object_options_are_read() {
        let schema: OptionsSchema = serde_json::from_str(r#"{"null": true, "max_length": 20}"#).unwrap();
        let raw = schema.parse().unwrap();
        assert_eq!(raw.get("null").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(raw.get("max_length").and_then(|v| v.as_u32()), Some(20));
    }
}
