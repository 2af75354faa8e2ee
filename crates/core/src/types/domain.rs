//! Custom domain name type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`DomainName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainNameError {
    /// The input string is empty.
    #[error("domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// A label between dots is empty or longer than 63 characters.
    #[error("invalid label '{0}'")]
    InvalidLabel(String),
    /// The domain contains a character outside `[a-z0-9-.]`.
    #[error("invalid character '{0}'")]
    InvalidCharacter(char),
    /// The domain has no TLD (a single label like `localhost`).
    #[error("domain must contain at least one dot")]
    MissingTld,
    /// The TLD is purely numeric (looks like an IP address).
    #[error("top-level domain cannot be numeric")]
    NumericTld,
}

/// A fully-qualified domain name a store can attach as a custom domain.
///
/// Parsing normalizes to lowercase and strips a single trailing dot, so
/// `Shop.Example.COM.` and `shop.example.com` compare equal. The stored form
/// is what the unique index on `custom_domains.domain` sees.
///
/// ## Constraints
///
/// - Length: 1-253 characters
/// - At least two labels, each 1-63 characters of `[a-z0-9-]`
/// - Labels cannot start or end with a hyphen
/// - The TLD cannot be all digits
///
/// ## Examples
///
/// ```
/// use shopforge_core::DomainName;
///
/// let domain = DomainName::parse("Shop.Example.com.").unwrap();
/// assert_eq!(domain.as_str(), "shop.example.com");
/// assert_eq!(domain.apex(), "example.com");
///
/// assert!(DomainName::parse("localhost").is_err());
/// assert!(DomainName::parse("10.0.0.1").is_err());
/// assert!(DomainName::parse("-bad.example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    /// Maximum length of a domain name.
    pub const MAX_LENGTH: usize = 253;

    /// Maximum length of a single label.
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Parse a `DomainName` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, has an invalid
    /// label or character, or lacks a non-numeric TLD.
    pub fn parse(s: &str) -> Result<Self, DomainNameError> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
        let lower = trimmed.to_ascii_lowercase();

        if lower.is_empty() {
            return Err(DomainNameError::Empty);
        }

        if lower.len() > Self::MAX_LENGTH {
            return Err(DomainNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = lower
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.'))
        {
            return Err(DomainNameError::InvalidCharacter(c));
        }

        let labels: Vec<&str> = lower.split('.').collect();
        for label in &labels {
            if label.is_empty()
                || label.len() > Self::MAX_LABEL_LENGTH
                || label.starts_with('-')
                || label.ends_with('-')
            {
                return Err(DomainNameError::InvalidLabel((*label).to_owned()));
            }
        }

        if labels.len() < 2 {
            return Err(DomainNameError::MissingTld);
        }

        if labels
            .last()
            .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(DomainNameError::NumericTld);
        }

        Ok(Self(lower))
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `DomainName` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The last two labels (`shop.example.com` → `example.com`).
    ///
    /// Does not consult the public suffix list, so `shop.example.co.uk`
    /// yields `co.uk`. Only used for display and CNAME hints.
    #[must_use]
    pub fn apex(&self) -> &str {
        let mut dots = self.0.rmatch_indices('.');
        dots.next();
        dots.next().map_or(self.0.as_str(), |(i, _)| &self.0[i + 1..])
    }

    /// Whether the domain is an apex (exactly two labels).
    #[must_use]
    pub fn is_apex(&self) -> bool {
        self.0.matches('.').count() == 1
    }

    /// Name of the TXT record that proves ownership of this domain.
    #[must_use]
    pub fn verification_record_name(&self) -> String {
        format!("_shopforge-verification.{}", self.0)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DomainName {
    type Err = DomainNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DomainName {
    type Error = DomainNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DomainName> for String {
    fn from(value: DomainName) -> Self {
        value.0
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for DomainName {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for DomainName {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Only parsed values are ever written
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for DomainName {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
