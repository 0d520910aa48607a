use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Customer contact data (email, phone) that must not leak into logs.
///
/// `Debug` and `Display` print a redacted hint; serialization passes the real
/// value through so API responses stay intact.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    /// Redacted form, e.g. `j*******@example.com` or `*******42`.
    pub fn redacted(&self) -> String {
        redact(self.0.as_ref())
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Masked({})", self.redacted())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Responses need the real value; redaction only applies to formatting.
        self.0.serialize(serializer)
    }
}

fn redact(value: &str) -> String {
    const STARS: &str = "*******";

    if value.is_empty() {
        return String::new();
    }

    if let Some((local, domain)) = value.split_once('@') {
        let first = local.chars().next().map(String::from).unwrap_or_default();
        return format!("{first}{STARS}@{domain}");
    }

    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return STARS.to_string();
    }
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{STARS}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_keeps_domain_only() {
        let email = Masked("jane.doe@example.com".to_string());
        assert_eq!(format!("{}", email), "j*******@example.com");
        assert_eq!(format!("{:?}", email), "Masked(j*******@example.com)");
    }

    #[test]
    fn test_phone_keeps_last_two_digits() {
        let phone = Masked("+1 808 555 0142".to_string());
        assert_eq!(phone.redacted(), "*******42");
        assert_eq!(Masked("123".to_string()).redacted(), "*******");
    }

    #[test]
    fn test_serialization_is_transparent() {
        let email = Masked("jane@example.com".to_string());
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"jane@example.com\"");

        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, "jane@example.com");
    }
}
