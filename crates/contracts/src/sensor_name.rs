//! SensorName - shared name for adaptors and channels
//!
//! Adaptor and channel names are registered once at startup and then passed
//! around on every request/release call, so they are backed by `Arc<str>`.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Registry key for a device adaptor (`"stepcounteradaptor"`) or a logical
/// sensor channel (`"stepcountersensor"`).
///
/// # Examples
/// ```
/// use contracts::SensorName;
///
/// let name: SensorName = "pressureadaptor".into();
/// assert_eq!(name, "pressureadaptor");
/// assert_eq!(name.strip_suffix("adaptor"), Some("pressure"));
/// ```
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorName(Arc<str>);

impl SensorName {
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Config group used for `<group>/<key>` lookups.
    ///
    /// `"stepcounteradaptor"` and `"stepcountersensor"` both map to
    /// `"stepcounter"`.
    pub fn config_group(&self) -> &str {
        self.0
            .strip_suffix("adaptor")
            .or_else(|| self.0.strip_suffix("sensor"))
            .unwrap_or(&self.0)
    }
}

impl Deref for SensorName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SensorName {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SensorName {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SensorName {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for SensorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SensorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensorName({:?})", self.0)
    }
}

impl PartialEq<str> for SensorName {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for SensorName {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Serialize for SensorName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SensorName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_group() {
        assert_eq!(SensorName::new("lidsensoradaptor").config_group(), "lidsensor");
        assert_eq!(SensorName::new("humiditysensor").config_group(), "humidity");
        assert_eq!(SensorName::new("gyroscope").config_group(), "gyroscope");
    }

    #[test]
    fn test_hashmap_lookup_by_str() {
        let mut map: HashMap<SensorName, u32> = HashMap::new();
        map.insert("pressureadaptor".into(), 2);
        assert_eq!(map.get("pressureadaptor"), Some(&2));
    }

    #[test]
    fn test_clone_shares_storage() {
        let a = SensorName::new("alsadaptor");
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }
}
