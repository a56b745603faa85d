pub mod health;
pub use self::health::health;

pub mod request_access;
pub use self::request_access::request_access;

// common functions for the handlers
use regex::Regex;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_common_shapes() {
        assert!(valid_email("maria.perez@uchile.cl"));
        assert!(valid_email("contacto@mineria-atacama.cl"));
        assert!(valid_email("a@b.co"));
    }

    #[test]
    fn valid_email_rejects_malformed_addresses() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("@missing-local.cl"));
        assert!(!valid_email("no-tld@domain"));
        assert!(!valid_email("two words@domain.cl"));
        assert!(!valid_email(""));
    }
}
