//! String transforms used when building SQL statements by hand.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SQL_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Turn a `*` wildcard pattern into a SQL `LIKE` pattern.
///
/// Literal `%`, `_`, `"` and `'` are backslash-escaped first, then every `*`
/// becomes `%`.
///
/// ```
/// assert_eq!(regdb::escape::replace_wildcard("sys/*_db/1"), r"sys/%\_db/1");
/// ```
pub fn replace_wildcard(wildcard: &str) -> String {
    let mut out = String::with_capacity(wildcard.len() + 4);
    for c in wildcard.chars() {
        match c {
            '%' | '_' | '"' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            '*' => out.push('%'),
            _ => out.push(c),
        }
    }
    out
}

/// Escape quotes and backslashes for a quoted SQL literal.
///
/// Sequences the client already escaped (`\'`, `\"`) are left alone; any
/// other backslash is doubled.
///
/// ```
/// assert_eq!(regdb::escape::escape_string("it's"), r"it\'s");
/// assert_eq!(regdb::escape::escape_string(r"it\'s"), r"it\'s");
/// ```
pub fn escape_string(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();

    let mut backslashed = Vec::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        backslashed.push(c);
        if c == '\\' && !matches!(chars.get(i + 1), Some('"') | Some('\'')) {
            backslashed.push('\\');
        }
    }

    let quoted = escape_unescaped(&backslashed, '"');
    escape_unescaped(&quoted, '\'').into_iter().collect()
}

fn escape_unescaped(chars: &[char], quote: char) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == quote && (i == 0 || chars[i - 1] != '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Validate a device name and strip its protocol and instance prefixes.
///
/// Accepts `[tango:|taco:][//instance/]domain/family/member` and returns
/// `domain/family/member`. Wildcards are rejected.
///
/// Stricter than a plain slash count: an empty domain, family or member
/// (`a//c`, `a/b/`) and an empty instance (`///a/b/c`) are refused too, so
/// every accepted name splits cleanly with [`device_name_to_dfm`].
///
/// ```
/// use regdb::escape::check_device_name;
///
/// assert_eq!(check_device_name("tango://host:10000/sys/db/1").as_deref(), Some("sys/db/1"));
/// assert_eq!(check_device_name("sys/*/1"), None);
/// assert_eq!(check_device_name("sys//1"), None);
/// ```
pub fn check_device_name(device_name: &str) -> Option<String> {
    if device_name.contains('*') {
        return None;
    }

    let mut name = device_name
        .strip_prefix("tango:")
        .or_else(|| device_name.strip_prefix("taco:"))
        .unwrap_or(device_name);

    if let Some(rest) = name.strip_prefix("//") {
        let slash = rest.find('/')?;
        if slash == 0 {
            return None;
        }
        name = &rest[slash + 1..];
    }

    device_name_to_dfm(name)?;
    Some(name.to_string())
}

/// Split `domain/family/member` into its three parts.
///
/// Everything after the second `/` belongs to the member. All three parts
/// must be non-empty.
pub fn device_name_to_dfm(device_name: &str) -> Option<(&str, &str, &str)> {
    let (domain, rest) = device_name.split_once('/')?;
    let (family, member) = rest.split_once('/')?;
    if domain.is_empty() || family.is_empty() || member.is_empty() {
        return None;
    }
    Some((domain, family, member))
}

/// Whether `name` can be spliced into a statement as a table or column name.
pub fn is_sql_identifier(name: &str) -> bool {
    SQL_IDENTIFIER.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_replace_wildcard() {
        assert_eq!(replace_wildcard("*"), "%");
        assert_eq!(replace_wildcard("a%b"), r"a\%b");
        assert_eq!(replace_wildcard(r#"x"y'z"#), r#"x\"y\'z"#);
        assert_eq!(replace_wildcard("dserver/*/*"), "dserver/%/%");
    }

    #[test]
    fn test_escape_string_backslashes() {
        assert_eq!(escape_string(r"a\b"), r"a\\b");
        assert_eq!(escape_string(r"a\\b"), r"a\\\\b");
        assert_eq!(escape_string(r#"say \"hi\""#), r#"say \"hi\""#);
    }

    #[test]
    fn test_escape_string_quotes() {
        assert_eq!(escape_string("'start"), r"\'start");
        assert_eq!(escape_string(r#""both' kinds""#), r#"\"both\' kinds\""#);
        assert_eq!(escape_string("plain"), "plain");
    }

    #[test]
    fn test_check_device_name() {
        assert_eq!(check_device_name("sys/database/2").as_deref(), Some("sys/database/2"));
        assert_eq!(check_device_name("taco:a/b/c").as_deref(), Some("a/b/c"));
        assert_eq!(check_device_name("//host:10000/a/b/c").as_deref(), Some("a/b/c"));
        assert_eq!(check_device_name("a/b/c/d").as_deref(), Some("a/b/c/d"));

        assert_eq!(check_device_name("a/b"), None);
        assert_eq!(check_device_name("/b/c"), None);
        assert_eq!(check_device_name("a//c"), None);
        assert_eq!(check_device_name("a/b/"), None);
        assert_eq!(check_device_name("///a/b/c"), None);
        assert_eq!(check_device_name("//hostonly"), None);
    }

    #[test]
    fn test_device_name_to_dfm() {
        assert_eq!(device_name_to_dfm("sys/tg_test/1"), Some(("sys", "tg_test", "1")));
        assert_eq!(device_name_to_dfm("sys/tg_test"), None);
    }

    #[test]
    fn test_sql_identifier() {
        assert!(is_sql_identifier("property_device_hist"));
        assert!(is_sql_identifier("_x1"));
        assert!(!is_sql_identifier("1abc"));
        assert!(!is_sql_identifier("t; DROP TABLE device"));
        assert!(!is_sql_identifier(""));
    }

    proptest! {
        #[test]
        fn prop_escaped_quotes_are_always_preceded_by_backslash(s in ".*") {
            let escaped: Vec<char> = escape_string(&s).chars().collect();
            for (i, c) in escaped.iter().enumerate() {
                if *c == '\'' || *c == '"' {
                    prop_assert!(i > 0 && escaped[i - 1] == '\\');
                }
            }
        }

        #[test]
        fn prop_wildcard_output_has_no_star(s in ".*") {
            prop_assert!(!replace_wildcard(&s).contains('*'));
        }
    }
}
