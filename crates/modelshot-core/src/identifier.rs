//! Identifiers for content models, versions, users and slugs.
//!
//! Record ids are random UUIDs. Slugs are short, URL-safe strings assigned
//! once when a content model is created and never changed afterwards.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters a generated slug is drawn from.
const SLUG_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Length of a generated slug.
pub const SLUG_LENGTH: usize = 11;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identity of a content model record.
    ModelId
);

uuid_id!(
    /// Identity of a single version row.
    VersionId
);

uuid_id!(
    /// Identity of a stored image asset row.
    AssetId
);

/// Opaque user identifier issued by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URL-stable public handle of a content model.
///
/// # Examples
///
/// ```
/// use modelshot_core::identifier::{Slug, SLUG_LENGTH};
///
/// let slug = Slug::generate();
/// assert_eq!(slug.as_str().len(), SLUG_LENGTH);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Wraps an existing slug, e.g. one taken from a URL.
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Draws a new random slug.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let slug = (0..SLUG_LENGTH)
            .map(|_| char::from(SLUG_ALPHABET[rng.random_range(0..SLUG_ALPHABET.len())]))
            .collect();
        Self(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
