//! Identifier types used across the mediation crates
//!
//! Connection identifiers are assigned by the connection protocol and are
//! treated as opaque strings. Record identifiers are generated here as
//! UUID v4 strings so that they round-trip through any record store.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random identifier
            pub fn new_random() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier, returning the inner string
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_identifier!(
    /// Identifier of an established connection with a remote agent
    ConnectionId
);

string_identifier!(
    /// Identifier of a stored mediation record
    MediationId
);

string_identifier!(
    /// Identifier of a stored route record
    RouteId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_identifiers_are_distinct() {
        assert_ne!(MediationId::new_random(), MediationId::new_random());
    }

    #[test]
    fn identifiers_serialize_as_plain_strings() {
        let id = ConnectionId::from("conn-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn-1\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.to_string(), "conn-1");
    }
}
