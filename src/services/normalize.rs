//! Text normalization used to build app sort keys.

use deunicode::deunicode_char;

/// Combining diacritical marks block (U+0300..U+036F).
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Precomposed Latin letters that may carry a diacritic.
fn is_accented_latin(c: char) -> bool {
    c.is_alphabetic()
        && (('\u{00C0}'..='\u{024F}').contains(&c) || ('\u{1E00}'..='\u{1EFF}').contains(&c))
}

/// `deunicode` output that is one base letter, not a multi-letter expansion.
fn is_single_ascii_letter(s: &str) -> bool {
    let mut chars = s.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

/// Replaces accented Latin letters with their base letters.
///
/// Precomposed characters (`é`) become their single ASCII base letter,
/// standalone combining marks (the `\u{301}` in `e\u{301}`) are dropped.
/// Letters that are not a base letter plus a mark (`ß`, `æ`, `Œ`) and
/// non-Latin text pass through untouched.
///
/// # Examples
///
/// ```
/// use iosapplist::services::normalize::strip_latin_diacritics;
///
/// assert_eq!(strip_latin_diacritics("Café"), "Cafe");
/// assert_eq!(strip_latin_diacritics("Cafe\u{301}"), "Cafe");
/// assert_eq!(strip_latin_diacritics("Straße"), "Straße");
/// assert_eq!(strip_latin_diacritics("日本"), "日本");
/// ```
pub fn strip_latin_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_combining_mark(c) {
            continue;
        }
        if is_accented_latin(c) {
            match deunicode_char(c) {
                Some(base) if is_single_ascii_letter(base) => out.push_str(base),
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Builds the default ordering key for an app.
///
/// The key is the display name lowercased and stripped of Latin diacritics,
/// an underscore, then the lowercased bundle identifier.
///
/// ```
/// use iosapplist::services::normalize::sort_key;
///
/// assert_eq!(sort_key("Foo App", "com.example.Foo"), "foo app_com.example.foo");
/// ```
pub fn sort_key(display_name: &str, bundle_id: &str) -> String {
    format!(
        "{}_{}",
        strip_latin_diacritics(&display_name.to_lowercase()),
        bundle_id.to_lowercase()
    )
}
