//! Visibility states of a content model.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who may see a content model.
///
/// Serialized in upper case (`"PUBLIC"`, `"UNLISTED"`, `"PRIVATE"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Readable by anyone and included in default listings.
    #[default]
    Public,
    /// Readable by anyone holding the slug, excluded from default listings.
    Unlisted,
    /// Readable by the owner, or with the preview bypass secret.
    Private,
}

impl Visibility {
    pub const ALL: [Visibility; 3] = [Self::Public, Self::Unlisted, Self::Private];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Unlisted => "UNLISTED",
            Self::Private => "PRIVATE",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the three visibility names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown visibility `{0}`, expected one of PUBLIC, UNLISTED or PRIVATE")]
pub struct UnknownVisibility(pub String);

impl FromStr for Visibility {
    type Err = UnknownVisibility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVisibility(s.to_string()))
    }
}
