//! Identity types for Panowalk entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// STRING-BACKED ID TYPES
// ============================================================================

/// Macro to define a type-safe newtype over an opaque string identifier.
///
/// Panorama ids, task ids, and agent ids are assigned externally (by the
/// upstream imagery provider, the task generator, and the caller) and carry
/// no internal structure, so they wrap `String` rather than `Uuid`. The
/// newtypes keep them from being mixed up at compile time.
macro_rules! define_string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// View the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(PanoId, "Opaque identifier of a panorama, assigned by the upstream provider.");
define_string_id!(TaskId, "Identifier of a benchmark task; the task file stem is authoritative.");
define_string_id!(AgentId, "Identifier of the agent (or human player) driving a session.");
define_string_id!(GeofenceName, "Name of a geofence whitelist from the geofence config file.");

// ============================================================================
// SESSION ID
// ============================================================================

/// Globally unique session identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionId(#[cfg_attr(feature = "openapi", schema(value_type = String))] Uuid);

impl SessionId {
    /// Create a fresh random session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_ids_are_transparent() {
        let id = PanoId::new("CAoSLEFGMVFpcE0");
        assert_eq!(id.as_str(), "CAoSLEFGMVFpcE0");
        assert_eq!(format!("{}", id), "CAoSLEFGMVFpcE0");

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"CAoSLEFGMVFpcE0\"");

        let back: PanoId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_session_id_roundtrip() {
        let id = SessionId::generate();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
