//! String-keyed identifiers for authored catalog content.
//!
//! Catalog options, talent trees, and skills are identified by stable,
//! human-authored keys (e.g. "soldier", "weapon_focus_pistols") rather than
//! generated UUIDs, because catalogs are content files, not database rows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! define_key {
    ($name:ident, $entity:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new key. Keys must be non-empty and must not contain
            /// whitespace, since they are used in provenance tags and logs.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_key(concat!(
                        $entity,
                        " key cannot be empty"
                    )));
                }
                if value.chars().any(char::is_whitespace) {
                    return Err(DomainError::invalid_key(format!(
                        concat!($entity, " key cannot contain whitespace: {:?}"),
                        value
                    )));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_key!(OptionKey, "catalog option");
define_key!(TreeName, "talent tree");
define_key!(SkillName, "skill");
