//! Naming helpers used to derive table names, key names and accessor names.

use regex::Regex;
use std::sync::OnceLock;

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("goose", "geese"),
    ("mouse", "mice"),
    ("datum", "data"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
    ("analysis", "analyses"),
    ("crisis", "crises"),
    ("axis", "axes"),
];

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "news",
    "series",
    "species",
    "sheep",
    "fish",
    "metadata",
];

const O_EXCEPTIONS: &[&str] = &["photo", "piano", "halo", "memo", "pro", "auto"];

fn is_vowel(c: char) -> bool {
    "aeiou".contains(c.to_ascii_lowercase())
}

/// Re-apply the capitalization of `original`'s first letter to `word`.
fn match_case(original: &str, word: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        uppercase_first(word)
    } else {
        word.to_string()
    }
}

fn irregular(word: &str, plural: bool) -> Option<String> {
    let lower = word.to_ascii_lowercase();
    IRREGULAR.iter().find_map(|(singular, pl)| {
        let (from, to) = if plural { (singular, pl) } else { (pl, singular) };
        (lower == *from).then(|| match_case(word, to))
    })
}

fn is_uncountable(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    UNCOUNTABLE.iter().any(|u| lower.ends_with(u))
}

/// Simple English pluralization.
///
/// Irregular words keep the capitalization of their first letter, so
/// `Person` becomes `People`.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() || is_uncountable(word) {
        return word.to_string();
    }
    if let Some(plural) = irregular(word, true) {
        return plural;
    }

    let lower = word.to_ascii_lowercase();

    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh")
    {
        return format!("{word}es");
    }

    // quiz -> quizzes
    if lower.ends_with('z') {
        let chars: Vec<char> = lower.chars().collect();
        if chars.len() >= 2 && is_vowel(chars[chars.len() - 2]) {
            return format!("{word}zes");
        }
        return format!("{word}es");
    }

    if let Some(stripped) = word.strip_suffix(['y', 'Y']) {
        if stripped.chars().last().is_some_and(|c| !is_vowel(c)) {
            return format!("{stripped}ies");
        }
        return format!("{word}s");
    }

    if lower.ends_with("fe") {
        return format!("{}ves", &word[..word.len() - 2]);
    }
    if lower.ends_with('f') && !lower.ends_with("ff") {
        return format!("{}ves", &word[..word.len() - 1]);
    }

    if lower.ends_with('o') {
        let chars: Vec<char> = lower.chars().collect();
        if chars.len() >= 2
            && !is_vowel(chars[chars.len() - 2])
            && !O_EXCEPTIONS.contains(&lower.as_str())
        {
            return format!("{word}es");
        }
    }

    format!("{word}s")
}

/// Simple English singularization, the inverse of [`pluralize`] for the
/// forms it produces.
pub fn singularize(word: &str) -> String {
    if word.is_empty() || is_uncountable(word) {
        return word.to_string();
    }
    if let Some(singular) = irregular(word, false) {
        return singular;
    }

    let lower = word.to_ascii_lowercase();
    let cut = |n: usize| word[..word.len() - n].to_string();

    if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        return word.to_string();
    }
    if lower.ends_with("ies") && lower.len() > 3 {
        return format!("{}y", cut(3));
    }
    if lower.ends_with("lves") || lower.ends_with("rves") {
        return format!("{}f", cut(3));
    }
    if lower.ends_with("ives") {
        return format!("{}fe", cut(3));
    }
    if lower.ends_with("zzes") {
        return cut(3);
    }
    if lower.ends_with("xes")
        || lower.ends_with("ches")
        || lower.ends_with("shes")
        || lower.ends_with("sses")
        || lower.ends_with("zes")
        || lower.ends_with("oes")
    {
        return cut(2);
    }
    if lower.ends_with('s') {
        return cut(1);
    }
    word.to_string()
}

/// Convert `CamelCase`, `kebab-case` or spaced words to `snake_case`.
pub fn underscore(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.trim().chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c.is_whitespace() {
            if !result.ends_with('_') {
                result.push('_');
            }
        } else if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();
                // word boundary, or the end of an acronym followed by a word
                let boundary = prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next.is_some_and(|n| n.is_lowercase()));
                if boundary && !result.ends_with('_') {
                    result.push('_');
                }
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

fn camelize_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[-_\s]+(.)?").ok())
        .as_ref()
}

/// Remove separators and upper-case the character following each one.
///
/// `post_id` becomes `postId` and `User_id` becomes `UserId`; the first
/// character is left as is.
pub fn camelize(s: &str) -> String {
    let Some(pattern) = camelize_pattern() else {
        return s.trim().to_string();
    };
    pattern
        .replace_all(s.trim(), |caps: &regex::Captures<'_>| {
            caps.get(1)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_default()
        })
        .into_owned()
}

pub fn camelize_if(s: &str, condition: bool) -> String {
    if condition {
        camelize(s)
    } else {
        s.to_string()
    }
}

pub fn underscored_if(s: &str, condition: bool) -> String {
    if condition {
        underscore(s)
    } else {
        s.to_string()
    }
}

pub fn uppercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Concatenate two table names, case-insensitively smaller one first.
pub fn combine_table_names(a: &str, b: &str) -> String {
    if a.to_lowercase() < b.to_lowercase() {
        format!("{a}{b}")
    } else {
        format!("{b}{a}")
    }
}
