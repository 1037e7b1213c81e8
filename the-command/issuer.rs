use std::any::Any;

use serde::{
  Deserialize,
  Serialize,
};

/// How a message sent to an issuer should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
  Info,
  Syntax,
  Error,
}

/// Whoever typed the command: a player, a console, a chat user.
///
/// The engine only needs to test permissions and deliver already formatted
/// text. Resolvers that need the concrete host type downcast through
/// [`CommandIssuer::as_any`].
pub trait CommandIssuer: Send + Sync {
  /// Identity used in logs and handed to asynchronous completion handlers.
  fn name(&self) -> &str;

  fn has_permission(&self, permission: &str) -> bool;

  fn send_message(&self, kind: MessageType, text: &str);

  fn as_any(&self) -> &dyn Any;
}

impl dyn CommandIssuer + '_ {
  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.as_any().downcast_ref()
  }

  /// Whether the issuer holds every permission in `permissions`.
  pub fn has_all_permissions<'p>(&self, permissions: impl IntoIterator<Item = &'p str>) -> bool {
    permissions
      .into_iter()
      .all(|permission| self.has_permission(permission))
  }
}
