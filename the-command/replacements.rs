use indexmap::IndexMap;
use regex::{
  Captures,
  Regex,
  RegexBuilder,
};

/// `%name` templates substituted into declaration strings at registration.
///
/// Permissions, conditions, completions, value sets, defaults and flags may
/// all reference a replacement, e.g. a permission of `%admin.kick`. Keys are
/// matched case-insensitively on a word boundary.
#[derive(Debug, Clone)]
pub struct CommandReplacements {
  replacements: IndexMap<String, String>,
  pattern:      Option<Regex>,
}

impl Default for CommandReplacements {
  fn default() -> Self {
    let mut replacements = Self {
      replacements: IndexMap::new(),
      pattern:      None,
    };
    replacements.add("truthy", "true|false|yes|no|1|0|on|off");
    replacements
  }
}

impl CommandReplacements {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds or replaces a template, returning the previous value.
  pub fn add(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
    let key = key.trim_start_matches('%').to_lowercase();
    let old = self.replacements.insert(key, value.into());
    self.rebuild();
    old
  }

  pub fn add_all<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) {
    for (key, value) in pairs {
      self
        .replacements
        .insert(key.trim_start_matches('%').to_lowercase(), value.to_string());
    }
    self.rebuild();
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .replacements
      .get(&key.trim_start_matches('%').to_lowercase())
      .map(String::as_str)
  }

  pub fn replace(&self, text: &str) -> String {
    let Some(pattern) = &self.pattern else {
      return text.to_string();
    };

    pattern
      .replace_all(text, |caps: &Captures| {
        let key = caps[1].to_lowercase();
        self
          .replacements
          .get(&key)
          .cloned()
          .unwrap_or_else(|| caps[0].to_string())
      })
      .into_owned()
  }

  fn rebuild(&mut self) {
    if self.replacements.is_empty() {
      self.pattern = None;
      return;
    }

    let keys: Vec<_> = self
      .replacements
      .keys()
      .map(|key| regex::escape(key))
      .collect();
    let source = format!(r"%\b({})\b", keys.join("|"));
    self.pattern = match RegexBuilder::new(&source).case_insensitive(true).build() {
      Ok(pattern) => Some(pattern),
      Err(err) => {
        tracing::warn!(%err, "failed to compile replacement pattern");
        None
      },
    };
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn replaces_known_keys() {
    let mut replacements = CommandReplacements::new();
    replacements.add("admin", "myplugin.admin");
    assert_eq!(replacements.replace("%admin.kick"), "myplugin.admin.kick");
    assert_eq!(replacements.replace("%ADMIN"), "myplugin.admin");
    assert_eq!(replacements.replace("%administrator"), "%administrator");
    assert_eq!(replacements.replace("%unknown"), "%unknown");
  }

  #[test]
  fn builtin_truthy() {
    let replacements = CommandReplacements::new();
    assert_eq!(replacements.replace("%truthy"), "true|false|yes|no|1|0|on|off");
  }

  #[test]
  fn longer_keys_are_not_shadowed() {
    let mut replacements = CommandReplacements::new();
    replacements.add_all([("perm", "a"), ("permission", "b")]);
    assert_eq!(replacements.replace("%perm %permission"), "a b");
  }
}
