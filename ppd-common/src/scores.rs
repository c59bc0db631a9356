//! Typed dimension keys and insertion-ordered score maps
//!
//! Dimension keys travel on the wire as `"group::metric"` strings. Internally
//! they are parsed once into a [`DimensionKey`] so that group partitioning is a
//! typed operation instead of repeated string splitting.
//!
//! Both [`ScoreMap`] and [`GroupMap`] preserve insertion order. Tie lists
//! (argmin/argmax) and group partitions are reported in that order, so the
//! maps are backed by vectors rather than hash maps.

use crate::{Error, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Separator between group and metric in the wire form of a dimension key
pub const DIMENSION_DELIMITER: &str = "::";

/// Implicit group for keys that carry no namespace
pub const UNGROUPED: &str = "ungrouped";

/// A leaf measurable attribute, optionally namespaced under a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionKey {
    group: Option<String>,
    metric: String,
}

impl DimensionKey {
    /// Create a key from its parts
    ///
    /// The parts are joined into the wire form and re-split on the first
    /// `::`, so a group that itself contains `::` yields the same key as
    /// [`DimensionKey::parse`] on the joined string.
    pub fn new(group: impl AsRef<str>, metric: impl AsRef<str>) -> Self {
        Self::parse(&format!(
            "{}{}{}",
            group.as_ref(),
            DIMENSION_DELIMITER,
            metric.as_ref()
        ))
    }

    fn ungrouped(metric: impl Into<String>) -> Self {
        Self {
            group: None,
            metric: metric.into(),
        }
    }

    /// Parse the wire form, splitting on the first `::`
    pub fn parse(key: &str) -> Self {
        match key.split_once(DIMENSION_DELIMITER) {
            Some((group, metric)) => Self {
                group: Some(group.to_string()),
                metric: metric.to_string(),
            },
            None => Self::ungrouped(key),
        }
    }

    /// Group this dimension belongs to (`"ungrouped"` when not namespaced)
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or(UNGROUPED)
    }

    /// Metric name within the group
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// True if the key is explicitly namespaced under `group`
    pub fn is_in_group(&self, group: &str) -> bool {
        self.group.as_deref() == Some(group)
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}{}{}", group, DIMENSION_DELIMITER, self.metric),
            None => f.write_str(&self.metric),
        }
    }
}

impl From<&str> for DimensionKey {
    fn from(key: &str) -> Self {
        Self::parse(key)
    }
}

impl Serialize for DimensionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DimensionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Insertion-ordered mapping from dimension key to score
///
/// Keys are unique; [`ScoreMap::insert`] rejects duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap {
    entries: Vec<(DimensionKey, f64)>,
}

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, score)` pairs, failing on the first duplicate
    pub fn try_from_pairs<K, I>(pairs: I) -> Result<Self>
    where
        K: Into<DimensionKey>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let mut map = Self::new();
        for (key, value) in pairs {
            map.insert(key.into(), value)?;
        }
        Ok(map)
    }

    /// Append a score; fails with [`Error::DuplicateKey`] if the key exists
    pub fn insert(&mut self, key: DimensionKey, value: f64) -> Result<()> {
        if self.contains_key(&key) {
            return Err(Error::DuplicateKey(key.to_string()));
        }
        self.entries.push((key, value));
        Ok(())
    }

    pub fn get(&self, key: &DimensionKey) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn contains_key(&self, key: &DimensionKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DimensionKey, f64)> + '_ {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &DimensionKey> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    /// Apply a fallible transform to every score, preserving key order
    pub fn try_map_values<F>(&self, mut f: F) -> Result<ScoreMap>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let mut entries = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            entries.push((key.clone(), f(*value)?));
        }
        Ok(ScoreMap { entries })
    }

    /// Partition into per-group maps, groups in first-seen order
    pub fn partition_by_group(&self) -> GroupMap<ScoreMap> {
        let mut grouped: GroupMap<ScoreMap> = GroupMap::new();
        for (key, value) in &self.entries {
            grouped
                .get_or_insert_with(key.group(), ScoreMap::new)
                .entries
                .push((key.clone(), *value));
        }
        grouped
    }

    /// Scores whose keys are explicitly namespaced under `group`
    pub fn namespaced_in(&self, group: &str) -> ScoreMap {
        ScoreMap {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| k.is_in_group(group))
                .cloned()
                .collect(),
        }
    }
}

impl Serialize for ScoreMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k.to_string(), v)))
    }
}

impl<'de> Deserialize<'de> for ScoreMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ScoreMapVisitor;

        impl<'de> Visitor<'de> for ScoreMapVisitor {
            type Value = ScoreMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping dimension keys to numbers")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<ScoreMap, A::Error> {
                let mut map = ScoreMap::new();
                while let Some((key, value)) = access.next_entry::<String, f64>()? {
                    map.insert(DimensionKey::parse(&key), value)
                        .map_err(serde::de::Error::custom)?;
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ScoreMapVisitor)
    }
}

/// Insertion-ordered mapping from a name (group, threshold, label) to a value
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for GroupMap<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> GroupMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `group`, keeping its original position
    pub fn insert(&mut self, group: impl Into<String>, value: T) {
        let group = group.into();
        match self.entries.iter_mut().find(|(g, _)| *g == group) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((group, value)),
        }
    }

    pub fn get_or_insert_with<F: FnOnce() -> T>(&mut self, group: &str, f: F) -> &mut T {
        let idx = match self.entries.iter().position(|(g, _)| g == group) {
            Some(idx) => idx,
            None => {
                self.entries.push((group.to_string(), f()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    pub fn get(&self, group: &str) -> Option<&T> {
        self.entries.iter().find(|(g, _)| g == group).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(g, _)| g.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> + '_ {
        self.entries.iter().map(|(g, v)| (g.as_str(), v))
    }
}

impl<T> IntoIterator for GroupMap<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for GroupMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for GroupMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(g, v)| (g, v)))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for GroupMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct GroupMapVisitor<T>(std::marker::PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for GroupMapVisitor<T> {
            type Value = GroupMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map keyed by name")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<GroupMap<T>, A::Error> {
                let mut map = GroupMap::new();
                while let Some((name, value)) = access.next_entry::<String, T>()? {
                    map.insert(name, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(GroupMapVisitor(std::marker::PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_namespaced_key() {
        let key = DimensionKey::parse("communication_skills::clarity");
        assert_eq!(key.group(), "communication_skills");
        assert_eq!(key.metric(), "clarity");
        assert!(key.is_in_group("communication_skills"));
        assert_eq!(key.to_string(), "communication_skills::clarity");
    }

    #[test]
    fn test_parse_splits_on_first_delimiter_only() {
        let key = DimensionKey::parse("a::b::c");
        assert_eq!(key.group(), "a");
        assert_eq!(key.metric(), "b::c");
        assert_eq!(key.to_string(), "a::b::c");
    }

    #[test]
    fn test_parse_plain_key_is_ungrouped() {
        let key = DimensionKey::parse("A");
        assert_eq!(key.group(), UNGROUPED);
        assert!(!key.is_in_group(UNGROUPED));
        assert_eq!(key.to_string(), "A");
    }

    #[test]
    fn test_new_matches_parse_of_joined_key() {
        let nested = DimensionKey::new("a::b", "c");
        assert_eq!(nested, DimensionKey::new("a", "b::c"));
        assert_eq!(nested, DimensionKey::parse("a::b::c"));
        assert_eq!(nested.group(), "a");
        assert_eq!(nested.metric(), "b::c");
    }

    #[test]
    fn test_score_map_rejects_keys_equal_on_the_wire() {
        let mut map = ScoreMap::new();
        map.insert(DimensionKey::new("a::b", "c"), 1.0).unwrap();
        let err = map.insert(DimensionKey::new("a", "b::c"), 4.0).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(ref k) if k == "a::b::c"));
    }

    #[test]
    fn test_score_map_rejects_duplicates() {
        let mut map = ScoreMap::new();
        map.insert(DimensionKey::parse("g::a"), 1.0).unwrap();
        let err = map.insert(DimensionKey::new("g", "a"), 2.0).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(ref k) if k == "g::a"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_partition_preserves_first_seen_group_order() {
        let map = ScoreMap::try_from_pairs([
            ("b::x", 0.1),
            ("a::x", 0.2),
            ("b::y", 0.3),
            ("plain", 0.4),
        ])
        .unwrap();

        let grouped = map.partition_by_group();
        let groups: Vec<&str> = grouped.keys().collect();
        assert_eq!(groups, vec!["b", "a", UNGROUPED]);
        assert_eq!(grouped.get("b").unwrap().values(), vec![0.1, 0.3]);
    }

    #[test]
    fn test_score_map_json_preserves_order() {
        let map = ScoreMap::try_from_pairs([("z::1", 0.5), ("a::1", 0.25)]).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"z::1":0.5,"a::1":0.25}"#);

        let back: ScoreMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_score_map_json_rejects_duplicate_keys() {
        let result: std::result::Result<ScoreMap, _> = serde_json::from_str(r#"{"a":1.0,"a":2.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_group_map_insert_replaces_in_place() {
        let mut groups = GroupMap::new();
        groups.insert("first", 1);
        groups.insert("second", 2);
        groups.insert("first", 3);
        let pairs: Vec<(&str, &i32)> = groups.iter().collect();
        assert_eq!(pairs, vec![("first", &3), ("second", &2)]);
    }

    #[test]
    fn test_group_map_json_keeps_document_order() {
        let json = r#"{"tau_operational":0.6,"tau_high":0.8,"tau_low":0.4}"#;
        let map: GroupMap<f64> = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = map.keys().collect();
        assert_eq!(names, vec!["tau_operational", "tau_high", "tau_low"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), json);
    }
}
