//! Command resolution and execution engine.
//!
//! A [`CommandManager`] owns a table of root commands keyed by alias. Each
//! root command maps sub-command paths to one or more overloaded
//! [`RegisteredCommand`] signatures. Dispatching a line walks the path table,
//! picks an overload, resolves every declared [`Parameter`] through the
//! [`contexts`] registry, gates on permissions and [`conditions`], and invokes
//! the handler. Failures never escape [`CommandManager::dispatch`]: they are
//! reported to the [`CommandIssuer`] through a [`MessageCatalog`] and returned
//! as an [`ExecutionOutcome`].

pub mod command;
pub mod command_line;
pub mod completions;
pub mod conditions;
pub mod config;
pub mod contexts;
pub mod error;
pub mod execution;
pub mod flags;
pub mod help;
pub mod issuer;
pub mod manager;
pub mod messages;
pub mod param;
pub mod replacements;
pub mod router;
pub mod tree;
pub mod types;

pub use command::{
  CommandGroup,
  CommandSpec,
  ExceptionContext,
  ExceptionHandler,
  GroupId,
  RegisteredCommand,
};
pub use completions::{
  CompletionContext,
  CompletionRequest,
};
pub use conditions::ConditionContext;
pub use config::{
  ManagerConfig,
  UnknownCommandPolicy,
};
pub use contexts::{
  CommandEnum,
  ResolverKind,
};
pub use error::{
  ConditionFailed,
  DispatchError,
  ExecutionOutcome,
  InvalidArgument,
  RegistrationError,
};
pub use execution::{
  ExecutionContext,
  Invocation,
  ResolvedArgs,
};
pub use flags::Flags;
pub use help::{
  CommandHelp,
  HelpEntry,
};
pub use issuer::{
  CommandIssuer,
  MessageType,
};
pub use manager::CommandManager;
pub use messages::{
  Locales,
  Message,
  MessageCatalog,
  MessageKey,
};
pub use param::Parameter;
pub use types::{
  ParamType,
  Value,
};
