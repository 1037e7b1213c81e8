//! Message keys and the catalog that turns them into text.
//!
//! The engine never produces user facing text itself. Failures carry a
//! [`Message`], either a [`MessageKey`] with `{placeholder}` substitutions or
//! raw text from a resolver, and the [`MessageCatalog`] formats it.

use std::{
  collections::{
    BTreeMap,
    HashMap,
  },
  fmt,
};

use once_cell::sync::Lazy;

const DEFAULT_LOCALE: &str = include_str!("locales/en.toml");

static DEFAULT_MESSAGES: Lazy<HashMap<String, String>> = Lazy::new(|| {
  toml::from_str(DEFAULT_LOCALE).unwrap_or_else(|err| {
    tracing::error!(%err, "failed to parse the default message table");
    HashMap::new()
  })
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKey {
  PermissionDenied,
  PermissionDeniedParameter,
  ErrorGenericLogged,
  UnknownCommand,
  InvalidSyntax,
  ErrorPrefix,
  ErrorPerformingCommand,
  InfoMessage,
  PleaseSpecifyOneOf,
  MustBeANumber,
  MustBeMinLength,
  MustBeMaxLength,
  PleaseSpecifyAtLeast,
  PleaseSpecifyAtMost,
  NotAllowedOnConsole,
  MissingArgument,
  HelpHeader,
  HelpSearchHeader,
  HelpFormat,
  HelpPageInformation,
  HelpNoResults,
}

impl MessageKey {
  pub const ALL: &'static [MessageKey] = &[
    MessageKey::PermissionDenied,
    MessageKey::PermissionDeniedParameter,
    MessageKey::ErrorGenericLogged,
    MessageKey::UnknownCommand,
    MessageKey::InvalidSyntax,
    MessageKey::ErrorPrefix,
    MessageKey::ErrorPerformingCommand,
    MessageKey::InfoMessage,
    MessageKey::PleaseSpecifyOneOf,
    MessageKey::MustBeANumber,
    MessageKey::MustBeMinLength,
    MessageKey::MustBeMaxLength,
    MessageKey::PleaseSpecifyAtLeast,
    MessageKey::PleaseSpecifyAtMost,
    MessageKey::NotAllowedOnConsole,
    MessageKey::MissingArgument,
    MessageKey::HelpHeader,
    MessageKey::HelpSearchHeader,
    MessageKey::HelpFormat,
    MessageKey::HelpPageInformation,
    MessageKey::HelpNoResults,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      MessageKey::PermissionDenied => "permission_denied",
      MessageKey::PermissionDeniedParameter => "permission_denied_parameter",
      MessageKey::ErrorGenericLogged => "error_generic_logged",
      MessageKey::UnknownCommand => "unknown_command",
      MessageKey::InvalidSyntax => "invalid_syntax",
      MessageKey::ErrorPrefix => "error_prefix",
      MessageKey::ErrorPerformingCommand => "error_performing_command",
      MessageKey::InfoMessage => "info_message",
      MessageKey::PleaseSpecifyOneOf => "please_specify_one_of",
      MessageKey::MustBeANumber => "must_be_a_number",
      MessageKey::MustBeMinLength => "must_be_min_length",
      MessageKey::MustBeMaxLength => "must_be_max_length",
      MessageKey::PleaseSpecifyAtLeast => "please_specify_at_least",
      MessageKey::PleaseSpecifyAtMost => "please_specify_at_most",
      MessageKey::NotAllowedOnConsole => "not_allowed_on_console",
      MessageKey::MissingArgument => "missing_argument",
      MessageKey::HelpHeader => "help_header",
      MessageKey::HelpSearchHeader => "help_search_header",
      MessageKey::HelpFormat => "help_format",
      MessageKey::HelpPageInformation => "help_page_information",
      MessageKey::HelpNoResults => "help_no_results",
    }
  }

  pub fn from_name(key: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|k| k.as_str() == key)
  }
}

impl fmt::Display for MessageKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A user facing message before localization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
  Key {
    key:          MessageKey,
    replacements: Vec<(&'static str, String)>,
  },
  Raw(String),
}

impl Message {
  pub fn key(key: MessageKey) -> Self {
    Message::Key {
      key,
      replacements: Vec::new(),
    }
  }

  pub fn raw(text: impl Into<String>) -> Self {
    Message::Raw(text.into())
  }

  /// Adds a `{name}` substitution. Has no effect on raw messages.
  pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
    if let Message::Key { replacements, .. } = &mut self {
      replacements.push((name, value.into()));
    }
    self
  }

  pub fn render(&self, catalog: &dyn MessageCatalog) -> String {
    match self {
      Message::Key { key, replacements } => catalog.format(*key, replacements),
      Message::Raw(text) => text.clone(),
    }
  }
}

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Message::Key { key, replacements } => {
        write!(f, "{key}")?;
        for (name, value) in replacements {
          write!(f, " {name}={value}")?;
        }
        Ok(())
      },
      Message::Raw(text) => f.write_str(text),
    }
  }
}

impl From<MessageKey> for Message {
  fn from(key: MessageKey) -> Self {
    Message::key(key)
  }
}

/// Turns message keys into final text.
pub trait MessageCatalog: Send + Sync {
  fn format(&self, key: MessageKey, replacements: &[(&'static str, String)]) -> String;
}

/// The built in catalog: English defaults plus per key overrides.
#[derive(Debug, Clone, Default)]
pub struct Locales {
  overrides: HashMap<MessageKey, String>,
}

impl Locales {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a catalog from overrides keyed by [`MessageKey::as_str`].
  /// Unknown keys are skipped.
  pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
    let mut locales = Self::new();
    for (key, text) in overrides {
      match MessageKey::from_name(key) {
        Some(key) => locales.set(key, text.clone()),
        None => tracing::warn!(key = %key, "ignoring override for unknown message key"),
      }
    }
    locales
  }

  pub fn set(&mut self, key: MessageKey, text: impl Into<String>) {
    self.overrides.insert(key, text.into());
  }

  pub fn template(&self, key: MessageKey) -> Option<&str> {
    self
      .overrides
      .get(&key)
      .or_else(|| DEFAULT_MESSAGES.get(key.as_str()))
      .map(String::as_str)
  }
}

impl MessageCatalog for Locales {
  fn format(&self, key: MessageKey, replacements: &[(&'static str, String)]) -> String {
    match self.template(key) {
      Some(template) => substitute(template, replacements),
      None => key.as_str().to_string(),
    }
  }
}

/// Replaces every `{name}` in `template` with its value.
pub fn substitute(template: &str, replacements: &[(&str, String)]) -> String {
  let mut text = template.to_string();
  for (name, value) in replacements {
    text = text.replace(&format!("{{{name}}}"), value);
  }
  text
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn every_key_has_a_default() {
    let locales = Locales::new();
    for key in MessageKey::ALL {
      assert!(locales.template(*key).is_some(), "missing default for {key}");
    }
  }

  #[test]
  fn formats_with_replacements() {
    let locales = Locales::new();
    let message = Message::key(MessageKey::PleaseSpecifyOneOf).with("valid", "a, b");
    assert_eq!(message.render(&locales), "Error: Please specify one of (a, b).");
  }

  #[test]
  fn overrides_win() {
    let mut overrides = BTreeMap::new();
    overrides.insert("unknown_command".to_string(), "Nope.".to_string());
    overrides.insert("not_a_key".to_string(), "ignored".to_string());
    let locales = Locales::with_overrides(&overrides);
    assert_eq!(locales.format(MessageKey::UnknownCommand, &[]), "Nope.");
  }

  #[test]
  fn raw_messages_pass_through() {
    let message = Message::raw("Must be a valid number").with("ignored", "x");
    assert_eq!(message.render(&Locales::new()), "Must be a valid number");
  }
}
