//! Language codes for per-language content rows.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`LanguageCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid language code '{0}': expected ISO 639-1 (e.g. 'en' or 'en-US')")]
pub struct LanguageCodeError(pub String);

/// An ISO 639-1 language code with an optional ISO 3166-1 region.
///
/// Normalized to `xx` or `xx-YY`; `EN_us` parses as `en-US`. This is the
/// `language_code` column of every translation table and the value of the
/// `X-Language` request header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Parse a language code.
    ///
    /// # Errors
    ///
    /// Returns `LanguageCodeError` if the input is not `xx` or `xx-YY`
    /// (underscores accepted as separator).
    pub fn parse(s: &str) -> Result<Self, LanguageCodeError> {
        let trimmed = s.trim();
        let mut parts = trimmed.splitn(2, ['-', '_']);
        let language = parts.next().unwrap_or_default();
        let region = parts.next();

        if language.len() != 2 || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LanguageCodeError(s.to_owned()));
        }

        match region {
            None => Ok(Self(language.to_ascii_lowercase())),
            Some(region) if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) => {
                Ok(Self(format!(
                    "{}-{}",
                    language.to_ascii_lowercase(),
                    region.to_ascii_uppercase()
                )))
            }
            Some(_) => Err(LanguageCodeError(s.to_owned())),
        }
    }

    /// The platform fallback language.
    #[must_use]
    pub fn english() -> Self {
        Self("en".to_owned())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare language without region (`en-US` → `en`).
    #[must_use]
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        Self::english()
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LanguageCode {
    type Err = LanguageCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = LanguageCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.0
    }
}
