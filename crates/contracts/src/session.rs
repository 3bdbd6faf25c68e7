//! Session identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque key for one client session.
///
/// Ordered so that arbitration maps iterate lowest id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i32);

impl SessionId {
    /// Wire value reported when no session wins arbitration.
    pub const SENTINEL: i32 = -1;

    #[inline]
    pub fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for SessionId {
    #[inline]
    fn from(v: i32) -> Self {
        Self(v)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
