//! Identifier types for the job domain.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $noun:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random ", $noun, " identifier.")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Creates a ", $noun, " identifier from an existing UUID.")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the wrapped UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for a review or report job.
    ///
    /// # Examples
    ///
    ///     use revue::job::domain::JobId;
    ///     use uuid::Uuid;
    ///
    ///     let uuid = Uuid::new_v4();
    ///     let id = JobId::from_uuid(uuid);
    ///     assert_eq!(id.into_inner(), uuid);
    ///     assert_eq!(id.to_string(), uuid.to_string());
    ///     assert_ne!(JobId::new(), JobId::new());
    JobId,
    "job"
);

uuid_identifier!(
    /// Unique identifier for a unit (rule run or report section) of a job.
    UnitId,
    "unit"
);

uuid_identifier!(
    /// Unique identifier for one execution attempt of a unit.
    AttemptId,
    "attempt"
);
