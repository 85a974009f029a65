//! Header names, well-known values, and the `HeaderSet` map.
//!
//! # Design
//! HTTP header names are case-insensitive, so `HeaderSet` lowercases names on
//! the way in. A global `Content-Type` and a per-call `content-type` therefore
//! collide and the per-call value wins, instead of both being sent.
//! Values are stored verbatim and never validated here; a transport rejects
//! illegal names or values when it builds the wire request.

use std::collections::BTreeMap;

use serde::Deserialize;

pub const CONTENT_TYPE: &str = "content-type";

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_JSON: &str = "text/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Ordered map of lowercase header names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, String>")]
pub struct HeaderSet(BTreeMap<String, String>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a header, returning the previous value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.0.insert(normalize(name.as_ref()), value.into())
    }

    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<String> {
        self.0.remove(&normalize(name.as_ref()))
    }

    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        self.0.get(&normalize(name.as_ref())).map(String::as_str)
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.0.contains_key(&normalize(name.as_ref()))
    }

    pub fn extend<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.insert(name, value);
        }
    }

    /// A new set with `overrides` laid over `self`. Neither input changes.
    pub fn merged(&self, overrides: &HeaderSet) -> HeaderSet {
        let mut merged = self.clone();
        merged
            .0
            .extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0.into_iter().collect()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        set.extend(iter);
        set
    }
}

impl From<BTreeMap<String, String>> for HeaderSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}
