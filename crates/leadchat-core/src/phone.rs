//! Phone-number normalization.
//!
//! The normalized form is the only key the conversation store accepts, so
//! `"+1-555-0100"` and `"15550100"` never end up as two conversations.

use serde::{Deserialize, Serialize};

use crate::constants::CONTACT_NAME_PREFIX;

/// Shortest national number left after stripping a country code.
/// Anything shorter is kept as-is rather than mangled.
const MIN_NATIONAL_DIGITS: usize = 6;

/// Strip everything but ASCII digits, then strip leading zeros.
/// Returns `None` when nothing is left.
pub fn normalize_phone(raw: Option<&str>) -> Option<String> {
    let digits: String = raw?.chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Key function for the conversation store.
///
/// Without a country code this is exactly [`normalize_phone`]. With one,
/// every international spelling (`+256 700 123456`, `00256700123456`, the
/// bare `256700123456` WhatsApp sends) and the national form (`0700 123456`)
/// collapse onto the same key. The code is stripped while at least
/// `MIN_NATIONAL_DIGITS` digits would remain, so re-normalizing a key never
/// changes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNormalizer {
    country_code: Option<String>,
}

impl PhoneNormalizer {
    pub fn new(country_code: Option<&str>) -> Self {
        Self {
            country_code: country_code.and_then(|cc| normalize_phone(Some(cc))),
        }
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    pub fn normalize(&self, raw: Option<&str>) -> Option<String> {
        let mut digits = normalize_phone(raw)?;
        let Some(cc) = &self.country_code else {
            return Some(digits);
        };

        while let Some(rest) = digits.strip_prefix(cc.as_str()) {
            let rest = rest.trim_start_matches('0');
            if rest.len() < MIN_NATIONAL_DIGITS {
                break;
            }
            digits = rest.to_string();
        }
        Some(digits)
    }
}

/// Last four digits of a (normalized) phone number, or all of it if shorter
pub fn last4(phone: &str) -> &str {
    let start = phone.len().saturating_sub(4);
    phone.get(start..).unwrap_or(phone)
}

/// Fallback display name for a conversation without contact or lead name
pub fn fallback_contact_name(phone: &str) -> String {
    format!("{}{}", CONTACT_NAME_PREFIX, last4(phone))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_formatting_and_leading_zeros() {
        assert_eq!(
            normalize_phone(Some("+256-700-123456")),
            Some("256700123456".to_string())
        );
        assert_eq!(
            normalize_phone(Some("0700123456")),
            Some("700123456".to_string())
        );
        assert_eq!(
            normalize_phone(Some("+1 (555) 0100")),
            Some("15550100".to_string())
        );
    }

    #[test]
    fn test_normalize_empty_results() {
        assert_eq!(normalize_phone(None), None);
        assert_eq!(normalize_phone(Some("")), None);
        assert_eq!(normalize_phone(Some("+-()")), None);
        assert_eq!(normalize_phone(Some("0000")), None);
    }

    #[test]
    fn test_formatted_and_plain_numbers_alias() {
        assert_eq!(
            normalize_phone(Some("+1-555-0100")),
            normalize_phone(Some("15550100"))
        );
        assert_eq!(
            normalize_phone(Some("00700123456")),
            normalize_phone(Some("700-123-456"))
        );
    }

    #[test]
    fn test_country_code_collapses_international_and_national_forms() {
        let normalizer = PhoneNormalizer::new(Some("+256"));
        assert_eq!(
            normalizer.normalize(Some("+256-700-123456")),
            Some("700123456".to_string())
        );
        assert_eq!(
            normalizer.normalize(Some("0700123456")),
            Some("700123456".to_string())
        );
    }

    #[test]
    fn test_country_code_keeps_short_numbers() {
        let normalizer = PhoneNormalizer::new(Some("256"));
        // Remainder too short to be a national number
        assert_eq!(normalizer.normalize(Some("+2561234")), Some("2561234".to_string()));
        assert_eq!(normalizer.normalize(None), None);
    }

    #[test]
    fn test_country_code_stripped_without_international_prefix() {
        let normalizer = PhoneNormalizer::new(Some("256"));
        for raw in ["256700123456", "+256700123456", "00256 700 123456", "0700123456", "700123456"] {
            assert_eq!(normalizer.normalize(Some(raw)), Some("700123456".to_string()), "{raw}");
        }
    }

    #[test]
    fn test_country_code_normalization_is_idempotent() {
        let normalizer = PhoneNormalizer::new(Some("256"));
        for raw in ["+256-700-123456", "00256 256 123 456", "2561234", "+1 555 0100"] {
            let key = normalizer.normalize(Some(raw)).unwrap();
            assert_eq!(normalizer.normalize(Some(&key)), Some(key.clone()), "{raw}");
        }
    }

    #[test]
    fn test_default_normalizer_matches_plain_function() {
        let normalizer = PhoneNormalizer::default();
        assert_eq!(
            normalizer.normalize(Some("+256-700-123456")),
            normalize_phone(Some("+256-700-123456"))
        );
    }

    #[test]
    fn test_last4_and_fallback() {
        assert_eq!(last4("700123456"), "3456");
        assert_eq!(last4("12"), "12");
        assert_eq!(fallback_contact_name("700123456"), "Contact 3456");
    }
}
