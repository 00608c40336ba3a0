use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Error;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("identifier pattern is valid")
    })
}

/// A table or column name that is safe to place into SQL text once quoted
/// by a [`Dialect`](super::Dialect).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Validate a caller-supplied name. Only plain ASCII identifiers are
    /// accepted; anything carrying quotes, whitespace, or statement
    /// separators is rejected before it can reach the store.
    pub fn parse(name: &str) -> Result<Self, Error> {
        if identifier_pattern().is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(Error::InvalidIdentifier(name.to_string()))
        }
    }

    /// Accept a name reported by the store's own catalog. Catalog names may
    /// contain characters `parse` refuses (spaces, dashes) and may exceed its
    /// length limit on stores without one; quoting escapes them, so only
    /// empty or NUL-bearing names are rejected.
    pub fn from_catalog(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() || name.contains('\0') {
            return Err(Error::InvalidIdentifier(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_are_accepted() {
        for name in ["iris", "autompg", "Boston_2", "_staging", "a"] {
            assert_eq!(Identifier::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_injection_attempts_are_rejected() {
        let hostile = [
            "x; DROP TABLE y",
            "iris`; DELETE FROM users; --",
            "iris\" OR 1=1",
            "iris'",
            "iris--",
            "iris name",
            "1iris",
            "",
            "iris\0",
            "ïris",
        ];
        for name in hostile {
            assert!(
                matches!(Identifier::parse(name), Err(Error::InvalidIdentifier(_))),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn test_length_limit() {
        let longest = "a".repeat(64);
        assert!(Identifier::parse(&longest).is_ok());
        assert!(Identifier::parse(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_catalog_names_allow_punctuation() {
        let ident = Identifier::from_catalog("petal length (cm)").unwrap();
        assert_eq!(ident.as_str(), "petal length (cm)");
        assert!(Identifier::from_catalog("").is_err());
        assert!(Identifier::from_catalog("a\0b").is_err());
    }

    #[test]
    fn test_catalog_names_have_no_length_limit() {
        let long = "c".repeat(70);
        assert_eq!(Identifier::from_catalog(long.clone()).unwrap().as_str(), long);
    }
}
