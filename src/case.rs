//! Identifier case conversion and checks: application names are normalized to snake_case,
//! model names become PascalCase class names, generated file names use snake_case.

use regex::Regex;
use std::sync::OnceLock;

/// Python keywords (and soft keywords we never want as attribute names).
const RESERVED_WORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in",
    "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with",
    "yield",
];

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier pattern"))
}

/// True when `s` is a valid identifier in the generated target language.
pub fn is_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.contains(&s)
}

/// Convert a single identifier from camelCase / PascalCase to snake_case.
/// e.g. "userId" -> "user_id", "SalesOrder" -> "sales_order", "HTTPLog" -> "http_log"
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = if i > 0 { chars.get(i - 1).copied() } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map(|n| n.is_lowercase()).unwrap_or(false),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a snake_case identifier to PascalCase.
/// e.g. "order_line" -> "OrderLine", "courses" -> "Courses"
pub fn to_pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalize a user-supplied application name to lower_snake_case.
/// Spaces and dashes become underscores; runs of underscores collapse; surrounding whitespace is dropped.
/// e.g. "Sales Orders" -> "sales_orders", "HumanResources" -> "human_resources"
pub fn normalize_app_name(raw: &str) -> String {
    let replaced: String = raw
        .trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    let snake = to_snake_case(&replaced);
    let mut out = String::with_capacity(snake.len());
    for c in snake.chars() {
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}
