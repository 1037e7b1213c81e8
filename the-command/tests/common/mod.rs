#![allow(dead_code)]

use std::{
  any::Any,
  collections::HashSet,
  sync::Arc,
};

use parking_lot::Mutex;
use the_command::{
  CommandIssuer,
  MessageType,
  command_line,
};

/// An issuer that records everything sent to it.
pub struct TestIssuer {
  name:        String,
  permissions: HashSet<String>,
  messages:    Mutex<Vec<(MessageType, String)>>,
}

impl TestIssuer {
  pub fn new(name: &str) -> Self {
    Self {
      name:        name.to_string(),
      permissions: HashSet::new(),
      messages:    Mutex::new(Vec::new()),
    }
  }

  pub fn with_permission(mut self, permission: &str) -> Self {
    self.permissions.insert(permission.to_string());
    self
  }

  pub fn messages(&self) -> Vec<(MessageType, String)> {
    self.messages.lock().clone()
  }

  pub fn texts(&self) -> Vec<String> {
    self
      .messages
      .lock()
      .iter()
      .map(|(_, text)| text.clone())
      .collect()
  }

  pub fn clear(&self) {
    self.messages.lock().clear();
  }
}

impl CommandIssuer for TestIssuer {
  fn name(&self) -> &str {
    &self.name
  }

  fn has_permission(&self, permission: &str) -> bool {
    self.permissions.contains(permission) || self.permissions.contains("*")
  }

  fn send_message(&self, kind: MessageType, text: &str) {
    self.messages.lock().push((kind, text.to_string()));
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// Shared log that handlers push into.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
  pub fn push(&self, call: impl Into<String>) {
    self.0.lock().push(call.into());
  }

  pub fn take(&self) -> Vec<String> {
    std::mem::take(&mut *self.0.lock())
  }

  pub fn is_empty(&self) -> bool {
    self.0.lock().is_empty()
  }
}

pub fn args(input: &str) -> Vec<String> {
  command_line::tokenize(input)
}
