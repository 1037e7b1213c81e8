use thiserror::Error;

use crate::messages::{
  Message,
  MessageKey,
};

/// A resolver or value restriction rejected the input.
///
/// Returned by context resolvers and completion handlers, and recognized when
/// a command handler fails with it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InvalidArgument {
  pub message:     Message,
  /// Whether the command's usage line should follow the message.
  pub show_syntax: bool,
}

impl InvalidArgument {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message:     Message::raw(message),
      show_syntax: true,
    }
  }

  pub fn key(message: impl Into<Message>) -> Self {
    Self {
      message:     message.into(),
      show_syntax: true,
    }
  }

  /// An empty error that only shows the usage line.
  pub fn syntax() -> Self {
    Self::new("")
  }

  pub fn without_syntax(mut self) -> Self {
    self.show_syntax = false;
    self
  }
}

impl From<MessageKey> for InvalidArgument {
  fn from(key: MessageKey) -> Self {
    Self::key(key)
  }
}

/// A condition rejected the command or one of its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConditionFailed {
  pub message: Message,
}

impl ConditionFailed {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: Message::raw(message),
    }
  }

  pub fn key(message: impl Into<Message>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Why a dispatch did not reach a successful handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
  #[error("unknown command '{alias}'")]
  UnknownCommand { alias: String },
  #[error("no signature of '{command}' accepts the given arguments")]
  NoMatchingCommand { command: String },
  #[error("{}", format_permission_denied(.parameter))]
  PermissionDenied { parameter: Option<String> },
  #[error(transparent)]
  InvalidArgument(#[from] InvalidArgument),
  #[error(transparent)]
  ConditionFailed(#[from] ConditionFailed),
  #[error("missing required argument '{parameter}'")]
  MissingArgument { parameter: String },
  #[error("no context resolver registered for type {type_name}")]
  ResolverNotFound { type_name: &'static str },
  #[error("unknown condition '{id}'")]
  UnknownCondition { id: String },
  #[error("command handler failed: {message}")]
  HandlerFailed {
    message: String,
    /// Whether an exception handler took care of reporting the failure.
    handled: bool,
  },
}

fn format_permission_denied(parameter: &Option<String>) -> String {
  match parameter {
    Some(parameter) => format!("permission denied for parameter '{parameter}'"),
    None => "permission denied".to_string(),
  }
}

impl DispatchError {
  /// Errors caused by how commands were set up rather than by the input.
  pub fn is_internal(&self) -> bool {
    matches!(
      self,
      DispatchError::ResolverNotFound { .. }
        | DispatchError::UnknownCondition { .. }
        | DispatchError::HandlerFailed { .. }
    )
  }
}

/// The structured result of one dispatch.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
  Succeeded,
  Failed(DispatchError),
}

impl ExecutionOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, ExecutionOutcome::Succeeded)
  }

  pub fn error(&self) -> Option<&DispatchError> {
    match self {
      ExecutionOutcome::Succeeded => None,
      ExecutionOutcome::Failed(err) => Some(err),
    }
  }

  pub fn into_result(self) -> Result<(), DispatchError> {
    match self {
      ExecutionOutcome::Succeeded => Ok(()),
      ExecutionOutcome::Failed(err) => Err(err),
    }
  }
}

/// A command group could not be registered.
#[derive(Debug, Error)]
pub enum RegistrationError {
  #[error("command group declares no root alias")]
  EmptyAlias,
  #[error("'{command}' has ambiguous overloads: '{first}' and '{second}'")]
  AmbiguousOverload {
    command: String,
    first:   String,
    second:  String,
  },
  #[error("parameter '{parameter}' of '{command}' consumes the remaining input but is not last")]
  MisplacedRestParameter { command: String, parameter: String },
  #[error("parameter '{parameter}' is declared twice in '{command}'")]
  DuplicateParameter { command: String, parameter: String },
  #[error("invalid split pattern for parameter '{parameter}'")]
  InvalidSplitPattern {
    parameter: String,
    #[source]
    source:    regex::Error,
  },
  #[error("group {0:?} is not registered")]
  UnknownGroup(crate::command::GroupId),
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn display_permission_denied() {
    let err = DispatchError::PermissionDenied { parameter: None };
    assert_eq!(err.to_string(), "permission denied");
    let err = DispatchError::PermissionDenied {
      parameter: Some("target".into()),
    };
    assert_eq!(err.to_string(), "permission denied for parameter 'target'");
  }

  #[test]
  fn invalid_argument_display_uses_message() {
    let err: DispatchError = InvalidArgument::new("Must be a valid number").into();
    assert_eq!(err.to_string(), "Must be a valid number");
    assert!(!err.is_internal());
  }
}
