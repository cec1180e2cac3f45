//! Search utilities shared across crates.
//!
//! Provides consistent search semantics for text matching, including:
//! - Multi-term AND queries with '+' operator
//! - ASCII case-insensitive matching
//! - Digit-only matching for phone numbers

/// Parse a search query into individual search terms.
///
/// The '+' operator splits the query into multiple terms that must ALL match.
/// Each term is trimmed and lowercased.
///
/// # Examples
/// - "amina" -> ["amina"]
/// - "amina+visa" -> ["amina", "visa"]
/// - "  amina + visa  " -> ["amina", "visa"]
/// - "" -> []
pub fn parse_search_terms(query: &str) -> Vec<String> {
    query
        .split('+')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Check if text contains a search term (ASCII case-insensitive)
pub fn text_contains_term(text: &str, term: &str) -> bool {
    let text_chars: Vec<char> = text.chars().collect();
    let term_chars: Vec<char> = term.chars().collect();

    if term_chars.is_empty() {
        return true;
    }

    if text_chars.len() < term_chars.len() {
        return false;
    }

    text_chars
        .windows(term_chars.len())
        .any(|window| window.iter().zip(&term_chars).all(|(c, t)| c.eq_ignore_ascii_case(t)))
}

/// Check if a phone number matches a term by digits only, so "0700 123"
/// finds "700123456". Terms without digits never match.
pub fn phone_contains_term(phone: &str, term: &str) -> bool {
    let digits: String = term.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_start_matches('0');
    !digits.is_empty() && phone.contains(digits)
}

/// Check if any of the fields contains every term.
/// Each term may be satisfied by a different field.
pub fn fields_contain_all_terms(fields: &[&str], phone: &str, terms: &[String]) -> bool {
    terms.iter().all(|term| {
        phone_contains_term(phone, term) || fields.iter().any(|f| text_contains_term(f, term))
    })
}
