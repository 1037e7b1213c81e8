//! Suggestions for partially typed commands.
//!
//! Completion handlers are registered under an `@id`. A command declares its
//! completions as a space separated list mapped positionally onto the
//! parameters that consume input. Each position is a pipe separated mix of
//! `@id[:config]` references and literal suggestions; `*` stands for the
//! default completion of the parameter's type, and a final `repeat@id` entry
//! covers every position without an entry of its own.

use std::{
  any::Any,
  collections::HashMap,
  fmt,
  sync::Arc,
};

use futures_util::future::BoxFuture;

use crate::{
  command::RegisteredCommand,
  error::InvalidArgument,
  flags::Flags,
  issuer::CommandIssuer,
  types::{
    ParamType,
    TypeHierarchy,
  },
};

const TIME_UNITS: &[&str] = &["minutes", "hours", "days", "weeks", "months", "years"];

/// What a synchronous completion handler gets to look at.
pub struct CompletionContext<'a> {
  issuer: &'a dyn CommandIssuer,
  input:  &'a str,
  config: Option<&'a str>,
  flags:  Flags,
  args:   &'a [String],
}

impl<'a> CompletionContext<'a> {
  pub(crate) fn new(
    issuer: &'a dyn CommandIssuer,
    input: &'a str,
    config: Option<&'a str>,
    args: &'a [String],
  ) -> Self {
    Self {
      issuer,
      input,
      config,
      flags: config.map(Flags::parse).unwrap_or_default(),
      args,
    }
  }

  pub fn issuer(&self) -> &dyn CommandIssuer {
    self.issuer
  }

  pub fn issuer_as<T: Any>(&self) -> Option<&T> {
    self.issuer.as_any().downcast_ref::<T>()
  }

  /// The partial token being completed.
  pub fn input(&self) -> &str {
    self.input
  }

  /// Raw text after `@id:`.
  pub fn config(&self) -> Option<&str> {
    self.config
  }

  pub fn has_config(&self, key: &str) -> bool {
    self.flags.has(key)
  }

  pub fn config_value(&self, key: &str) -> Option<&str> {
    self.flags.get(key)
  }

  /// Tokens after the sub-command path, the partial token last.
  pub fn args(&self) -> &[String] {
    self.args
  }
}

/// Owned request handed to asynchronous completion handlers.
///
/// Carries the issuer's name rather than the issuer, so the handler can run
/// anywhere and finish after the request that spawned it is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
  pub issuer: String,
  pub id:     String,
  pub input:  String,
  pub config: Option<String>,
  pub flags:  Flags,
  pub args:   Vec<String>,
}

pub type CompletionFn =
  Arc<dyn Fn(&CompletionContext<'_>) -> Result<Vec<String>, InvalidArgument> + Send + Sync>;

pub type AsyncCompletionFn = Arc<dyn Fn(CompletionRequest) -> BoxFuture<'static, Vec<String>> + Send + Sync>;

#[derive(Clone)]
pub enum CompletionHandler {
  Static(Arc<[String]>),
  Sync(CompletionFn),
  Async(AsyncCompletionFn),
}

impl fmt::Debug for CompletionHandler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CompletionHandler::Static(values) => f.debug_tuple("Static").field(values).finish(),
      CompletionHandler::Sync(_) => f.write_str("Sync"),
      CompletionHandler::Async(_) => f.write_str("Async"),
    }
  }
}

/// Suggestions that are either known now or still being computed.
pub enum PendingCompletion {
  Ready(Vec<String>),
  Pending(BoxFuture<'static, Vec<String>>),
}

/// Normalizes a completion id to its `@id` lookup form.
pub fn normalize_id(id: &str) -> String {
  format!("@{}", id.trim().trim_start_matches('@').to_lowercase())
}

#[derive(Debug, Clone)]
pub struct CommandCompletions {
  handlers: HashMap<String, CompletionHandler>,
  defaults: HashMap<ParamType, String>,
}

impl Default for CommandCompletions {
  fn default() -> Self {
    let mut completions = Self {
      handlers: HashMap::new(),
      defaults: HashMap::new(),
    };
    completions.register_builtins();
    completions
  }
}

impl CommandCompletions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, id: &str, handler: CompletionHandler) -> Option<CompletionHandler> {
    self.handlers.insert(normalize_id(id), handler)
  }

  pub fn get(&self, id: &str) -> Option<&CompletionHandler> {
    self.handlers.get(&normalize_id(id))
  }

  /// Sets the completion used for parameters of `ty` (and its subtypes)
  /// whose position has no explicit completion or `*`.
  pub fn set_default(&mut self, ty: ParamType, completion: impl Into<String>) {
    self.defaults.insert(ty, completion.into());
  }

  pub fn default_for(&self, hierarchy: &TypeHierarchy, ty: ParamType) -> Option<&str> {
    hierarchy
      .chain(ty)
      .find_map(|ty| self.defaults.get(&ty))
      .map(String::as_str)
  }

  fn register_builtins(&mut self) {
    let nothing: Arc<[String]> = Arc::from(Vec::new());
    self.register("empty", CompletionHandler::Static(nothing.clone()));
    self.register("nothing", CompletionHandler::Static(nothing));
    self.register(
      "timeunits",
      CompletionHandler::Static(TIME_UNITS.iter().map(|unit| unit.to_string()).collect()),
    );
    self.register("range", CompletionHandler::Sync(Arc::new(complete_range)));
  }

  /// Picks the completion text for the parameter at `index` of `command`.
  pub(crate) fn completion_for(
    &self,
    hierarchy: &TypeHierarchy,
    command: &RegisteredCommand,
    index: usize,
  ) -> Option<String> {
    let declared = command.completion();
    let mut completion = declared
      .get(index)
      .filter(|completion| completion.as_str() != "*")
      .cloned();

    if completion.is_none() {
      let param = command.input_params().nth(index);
      completion = param.and_then(|param| {
        self
          .default_for(hierarchy, param.ty())
          .map(str::to_string)
          .or_else(|| param.values.as_ref().map(|values| values.join("|")))
      });
    }

    if completion.is_none() {
      if let Some(last) = declared.last() {
        let past_end = index >= declared.len();
        if last.starts_with("repeat@") || (past_end && command.consumes_rest()) {
          completion = Some(last.clone());
        }
      }
    }

    completion.map(|completion| match completion.strip_prefix("repeat") {
      Some(id) if id.starts_with('@') => id.to_string(),
      _ => completion,
    })
  }

  /// Expands a completion text into suggestions, calling handlers as needed.
  pub(crate) fn expand(
    &self,
    completion: &str,
    issuer: &dyn CommandIssuer,
    input: &str,
    args: &[String],
  ) -> Vec<PendingCompletion> {
    let mut pending = Vec::new();
    for piece in completion.split('|').map(str::trim).filter(|piece| !piece.is_empty()) {
      let Some(reference) = piece.strip_prefix('@') else {
        pending.push(PendingCompletion::Ready(vec![piece.to_string()]));
        continue;
      };

      let (id, config) = match reference.split_once([':', '=']) {
        Some((id, config)) => (id, Some(config)),
        None => (reference, None),
      };

      match self.get(id) {
        Some(CompletionHandler::Static(values)) => pending.push(PendingCompletion::Ready(values.to_vec())),
        Some(CompletionHandler::Sync(handler)) => {
          let ctx = CompletionContext::new(issuer, input, config, args);
          match handler(&ctx) {
            Ok(values) => pending.push(PendingCompletion::Ready(values)),
            Err(err) => tracing::debug!(%err, id, "completion handler rejected the input"),
          }
        },
        Some(CompletionHandler::Async(handler)) => {
          let request = CompletionRequest {
            issuer: issuer.name().to_string(),
            id:     normalize_id(id),
            input:  input.to_string(),
            config: config.map(str::to_string),
            flags:  config.map(Flags::parse).unwrap_or_default(),
            args:   args.to_vec(),
          };
          pending.push(PendingCompletion::Pending(handler(request)));
        },
        None => pending.push(PendingCompletion::Ready(vec![piece.to_string()])),
      }
    }
    pending
  }

  /// Synchronous expansion used to check restricted parameter values.
  /// Asynchronous handlers contribute nothing here.
  pub(crate) fn expand_now(
    &self,
    completion: &str,
    issuer: &dyn CommandIssuer,
    input: &str,
    args: &[String],
  ) -> Vec<String> {
    let mut values = Vec::new();
    for pending in self.expand(completion, issuer, input, args) {
      match pending {
        PendingCompletion::Ready(ready) => values.extend(ready),
        PendingCompletion::Pending(_) => {
          tracing::debug!(completion, "skipping asynchronous completion in value check");
        },
      }
    }
    values
  }
}

fn complete_range(ctx: &CompletionContext<'_>) -> Result<Vec<String>, InvalidArgument> {
  let Some(config) = ctx.config() else {
    return Ok(Vec::new());
  };

  let parse = |bound: &str| {
    bound
      .trim()
      .parse::<i64>()
      .map_err(|_| InvalidArgument::new(format!("invalid range '{config}'")))
  };
  let (start, end) = match config.split_once('-') {
    Some((start, end)) => (parse(start)?, parse(end)?),
    None => (0, parse(config)?),
  };

  Ok((start..=end).map(|value| value.to_string()).collect())
}
