use std::{
  fmt,
  str::FromStr,
};

use indexmap::IndexMap;

/// Key/value options attached to a parameter, condition or completion.
///
/// Parsed from a comma separated list where each entry is either a bare key
/// or a `key=value` / `key:value` pair, for example `min=1,max=10,suffixes`.
/// Keys keep their declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
  entries: IndexMap<String, Option<String>>,
}

impl Flags {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn parse(input: &str) -> Self {
    let mut flags = Self::new();
    for entry in input.split(',') {
      let entry = entry.trim();
      if entry.is_empty() {
        continue;
      }
      match entry.split_once(['=', ':']) {
        Some((key, value)) => flags.insert(key.trim(), Some(value.trim())),
        None => flags.insert(entry, None),
      }
    }
    flags
  }

  pub fn insert(&mut self, key: &str, value: Option<&str>) {
    self
      .entries
      .insert(key.to_string(), value.map(str::to_string));
  }

  pub fn has(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  /// The value of `key`, or `None` if the key is absent or bare.
  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(key).and_then(|value| value.as_deref())
  }

  pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
    self.get(key).and_then(|value| value.parse().ok())
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
    self
      .entries
      .iter()
      .map(|(key, value)| (key.as_str(), value.as_deref()))
  }

  /// Copies every entry of `other` whose key is not already present.
  pub fn inherit(&mut self, other: &Flags) {
    for (key, value) in &other.entries {
      if !self.entries.contains_key(key) {
        self.entries.insert(key.clone(), value.clone());
      }
    }
  }
}

impl fmt::Display for Flags {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, (key, value)) in self.entries.iter().enumerate() {
      if i > 0 {
        f.write_str(",")?;
      }
      match value {
        Some(value) => write!(f, "{key}={value}")?,
        None => f.write_str(key)?,
      }
    }
    Ok(())
  }
}
