//! Pattern-string helpers used while compiling routes.
//!
//! Route matchers are assembled as plain pattern strings right-to-left and compiled
//! once. These helpers wrap and unwrap optional groups and vet user supplied
//! requirement patterns.

use regex::Regex;

/// Makes `pattern` optional, wrapping it in a non-capturing group unless it is
/// already a single atom.
pub fn optionalize(pattern: &str) -> String {
    if is_single_unit(unoptionalize(pattern)) {
        format!("{pattern}?")
    } else {
        format!("(?:{pattern})?")
    }
}

/// Strips one level of optionality added by [`optionalize`].
pub fn unoptionalize(pattern: &str) -> &str {
    if let Some(inner) = pattern
        .strip_prefix("(?:")
        .and_then(|rest| rest.strip_suffix(")?"))
    {
        if closing_paren(pattern, 0) == Some(pattern.len() - 2) {
            return inner;
        }
    }
    if let Some(inner) = pattern.strip_suffix('?') {
        if !ends_with_escape(inner) && is_single_unit(inner) {
            return inner;
        }
    }
    pattern
}

/// One character, or one group spanning the whole pattern.
fn is_single_unit(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c != '\\',
        (Some('('), Some(_)) => closing_paren(pattern, 0) == Some(pattern.len() - 1),
        _ => false,
    }
}

fn ends_with_escape(pattern: &str) -> bool {
    pattern.bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}

/// Byte offset of the parenthesis closing the one opened at `open`.
fn closing_paren(pattern: &str, open: usize) -> Option<usize> {
    let bytes = pattern.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_class = false;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'[' if !in_class => {
                in_class = true;
                // a leading `]` (or `^]`) is literal inside a class
                if bytes.get(i + 1) == Some(&b'^') {
                    i += 1;
                }
                if bytes.get(i + 1) == Some(&b']') {
                    i += 1;
                }
            }
            b']' if in_class => in_class = false,
            b'(' if !in_class => depth += 1,
            b')' if !in_class => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// True when the pattern carries its own start or end anchor.
pub fn has_anchor(source: &str) -> bool {
    source.starts_with("\\A")
        || source.starts_with('^')
        || source.ends_with("\\Z")
        || source.ends_with("\\z")
        || (source.ends_with('$') && !ends_with_escape(&source[..source.len() - 1]))
}

/// True when an inline flag group enables multiline (`m`) or dot-all (`s`).
pub fn has_multiline_flag(source: &str) -> bool {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == b'(' && bytes[i + 1] == b'?' {
            let flags: String = source[i + 2..]
                .chars()
                .take_while(|c| c.is_ascii_alphabetic() || *c == '-')
                .collect();
            let terminated = source[i + 2 + flags.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == ':' || c == ')');
            let enabled = flags.split('-').next().unwrap_or_default();
            if terminated && (enabled.contains('m') || enabled.contains('s')) {
                return true;
            }
        }
        i += 1;
    }
    false
}

/// Wraps a requirement so it must match a whole value.
pub fn anchored(source: &str) -> String {
    format!(r"\A(?:{source})\z")
}

/// Number of capture groups in a pattern fragment.
pub fn capture_count(chunk: &str) -> Result<usize, regex::Error> {
    Ok(Regex::new(chunk)?.captures_len() - 1)
}

/// True when values matched by `source` always form exactly one path token: the
/// pattern cannot match an empty string, a separator, or a dot.
pub fn is_single_token(source: &str) -> bool {
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('d') | Some('w') => {}
                _ => return false,
            },
            c if c.is_ascii_alphanumeric() => {}
            '_' | '-' | '+' | '*' | '?' | '{' | '}' | ',' | '|' | '(' | ')' | '[' | ']' => {}
            _ => return false,
        }
    }
    Regex::new(&anchored(source)).is_ok_and(|re| !re.is_match(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optionalize_single_char() {
        assert_eq!(optionalize("/"), "/?");
    }

    #[test]
    fn test_optionalize_group_and_sequence() {
        assert_eq!(optionalize("([^/.?]+)"), "([^/.?]+)?");
        assert_eq!(optionalize("([^/.?]+)/?"), "(?:([^/.?]+)/?)?");
        assert_eq!(optionalize(r"\."), r"(?:\.)?");
    }

    #[test]
    fn test_optionalize_two_groups_is_not_single() {
        assert_eq!(optionalize("(a)(b)"), "(?:(a)(b))?");
    }

    #[test]
    fn test_unoptionalize() {
        assert_eq!(unoptionalize("(?:abc)?"), "abc");
        assert_eq!(unoptionalize("/?"), "/");
        assert_eq!(unoptionalize("(x)?"), "(x)");
        assert_eq!(unoptionalize(r"\?"), r"\?");
        assert_eq!(unoptionalize("(?:a)(?:b)?"), "(?:a)(?:b)?");
    }

    #[test]
    fn test_closing_paren_skips_classes_and_escapes() {
        let p = r"([)\(]x)";
        assert_eq!(closing_paren(p, 0), Some(p.len() - 1));
    }

    #[test]
    fn test_has_anchor() {
        assert!(has_anchor(r"\A\d+\Z"));
        assert!(has_anchor(r"\d+\z"));
        assert!(has_anchor(r"^\d+"));
        assert!(has_anchor(r"\d+$"));
        assert!(!has_anchor(r"\d+\$"));
        assert!(!has_anchor(r"\d+"));
    }

    #[test]
    fn test_has_multiline_flag() {
        assert!(has_multiline_flag(r"(?m)\d+"));
        assert!(has_multiline_flag(r"(?is:.+)"));
        assert!(!has_multiline_flag(r"(?i)abc"));
        assert!(!has_multiline_flag(r"(?i-m:abc)"));
        assert!(!has_multiline_flag(r"\(?m\)"));
    }

    #[test]
    fn test_capture_count() {
        assert_eq!(capture_count("([^/.?]+)").unwrap(), 1);
        assert_eq!(capture_count("((a)(b))").unwrap(), 3);
        assert_eq!(capture_count("(?:x)").unwrap(), 0);
    }

    #[test]
    fn test_is_single_token() {
        assert!(is_single_token(r"\d+"));
        assert!(is_single_token("[a-z]+"));
        assert!(!is_single_token(r"\d*"));
        assert!(!is_single_token(".+"));
        assert!(!is_single_token("[^x]+"));
        assert!(!is_single_token("a/b"));
    }
}
