use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each generated type is `Copy`, serializes as a bare UUID string, and
/// converts to and from [`Uuid`].
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
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
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifier of an event-sourced aggregate instance (a crop batch, or a
    /// task in the neighbouring task context).
    AggregateId
);

uuid_id!(
    /// Identifier of a farm.
    FarmId
);

uuid_id!(
    /// Identifier of a farm area (a seeding bed, a greenhouse row, ...).
    AreaId
);

uuid_id!(
    /// Identifier of an inventory material, e.g. a seed variety.
    MaterialId
);

uuid_id!(
    /// Identifier of a task owned by the task context.
    TaskId
);

uuid_id!(NoteId);
uuid_id!(PhotoId);
uuid_id!(ActivityId);

impl AggregateId {
    /// Reinterprets a task identifier as the aggregate that emitted it.
    pub fn from_task(task_id: TaskId) -> Self {
        Self(task_id.as_uuid())
    }
}
