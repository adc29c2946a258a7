//! Newtype wrappers around [`uuid::Uuid`] for engine identifiers.
//!
//! Using distinct types prevents accidentally passing a `HookId` where an
//! `InvocationId` is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a newtype ID wrapper around `Uuid`.
///
/// The second argument is the generator used by `new()`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $generate:path
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier.
            pub fn new() -> Self {
                Self($generate())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Return the inner UUID value.
            pub fn into_uuid(self) -> Uuid {
                self.0
            }

            /// Return a reference to the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a hook registration.
    HookId,
    Uuid::new_v4
);

define_id!(
    /// Unique identifier for one operation invocation.
    ///
    /// Time-ordered (v7) so invocation IDs sort by start time in logs.
    InvocationId,
    Uuid::now_v7
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_id_new() {
        let id1 = HookId::new();
        let id2 = HookId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_hook_id_display() {
        let uuid = Uuid::new_v4();
        let id = HookId::from_uuid(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn test_invocation_id_from_str() {
        let uuid = Uuid::now_v7();
        let id: InvocationId = uuid.to_string().parse().expect("should parse");
        assert_eq!(id.0, uuid);
    }
}
