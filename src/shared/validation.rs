use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Mobile money phone number (Kenyan format)
    /// - Valid: "0712345678", "0112345678", "254712345678", "+254712345678"
    /// - Invalid: "712345678", "0812345678", "+2547123456789"
    pub static ref PHONE_REGEX: Regex = Regex::new(r"^(?:\+?254|0)[17]\d{8}$").unwrap();

    /// Document type slug as stored on report documents
    /// - Valid: "national_id", "passport", "kra_pin", "driving_license"
    /// - Invalid: "National ID", "_id", "id_"
    pub static ref DOCUMENT_TYPE_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:_[a-z0-9]+)*$").unwrap();

    /// Document number as typed by a user: letters, digits, spaces, hyphens and slashes
    pub static ref DOCUMENT_NUMBER_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 /-]{2,39}$").unwrap();
}

/// Strip spaces a user may have typed inside a phone number
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_regex_valid() {
        assert!(PHONE_REGEX.is_match("0712345678"));
        assert!(PHONE_REGEX.is_match("0112345678"));
        assert!(PHONE_REGEX.is_match("254712345678"));
        assert!(PHONE_REGEX.is_match("+254712345678"));
        assert!(PHONE_REGEX.is_match(&normalize_phone("0712 345 678")));
    }

    #[test]
    fn test_phone_regex_invalid() {
        assert!(!PHONE_REGEX.is_match("712345678")); // missing prefix
        assert!(!PHONE_REGEX.is_match("0812345678")); // not a mobile range
        assert!(!PHONE_REGEX.is_match("+2547123456789")); // too long
        assert!(!PHONE_REGEX.is_match(""));
    }

    #[test]
    fn test_document_type_regex() {
        assert!(DOCUMENT_TYPE_REGEX.is_match("national_id"));
        assert!(DOCUMENT_TYPE_REGEX.is_match("passport"));
        assert!(!DOCUMENT_TYPE_REGEX.is_match("National ID"));
        assert!(!DOCUMENT_TYPE_REGEX.is_match("_id"));
        assert!(!DOCUMENT_TYPE_REGEX.is_match("id_"));
    }

    #[test]
    fn test_document_number_regex() {
        assert!(DOCUMENT_NUMBER_REGEX.is_match("12345678"));
        assert!(DOCUMENT_NUMBER_REGEX.is_match("AK 123-456"));
        assert!(!DOCUMENT_NUMBER_REGEX.is_match(" 123"));
        assert!(!DOCUMENT_NUMBER_REGEX.is_match("12"));
    }
}
