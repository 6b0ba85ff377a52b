//! Stable entity identities.
//!
//! Every entity in a [`Book`](crate::Book) is keyed by a random UUID v4 so
//! cross-references survive serialization and never depend on arena position.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
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
    };
}

entity_id!(
    /// Identity of an [`Account`](crate::Account).
    AccountId
);
entity_id!(
    /// Identity of a [`Transaction`](crate::Transaction).
    TransactionId
);
entity_id!(
    /// Identity of a [`Split`](crate::Split).
    SplitId
);
entity_id!(
    /// Identity of a [`Lot`](crate::Lot).
    LotId
);
