//! The dispatch front door.
//!
//! [`CommandManager`] owns the alias table and every registry. Reads go
//! through an [`ArcSwap`] snapshot of the table, so dispatch and completion
//! never wait on registration. Registration builds a new table from the
//! current one and publishes it; writers are serialized by a mutex.

use std::{
  any::Any,
  future::Future,
  panic::{
    self,
    AssertUnwindSafe,
  },
  sync::{
    Arc,
    atomic::{
      AtomicU64,
      Ordering,
    },
  },
};

use arc_swap::ArcSwap;
use futures_util::{
  FutureExt,
  future::{
    self,
    BoxFuture,
  },
};
use indexmap::IndexSet;
use parking_lot::{
  Mutex,
  RwLock,
};

use crate::{
  command::{
    CommandGroup,
    ExceptionContext,
    ExceptionHandler,
    GroupId,
    RegisteredCommand,
  },
  command_line,
  completions::{
    CommandCompletions,
    CompletionContext,
    CompletionHandler,
    CompletionRequest,
    PendingCompletion,
  },
  conditions::{
    CommandConditions,
    ConditionContext,
    ConditionFn,
    ParameterConditionFn,
  },
  config::{
    ManagerConfig,
    UnknownCommandPolicy,
  },
  contexts::{
    CommandContexts,
    CommandEnum,
    ContextResolver,
    enum_names,
  },
  error::{
    ConditionFailed,
    DispatchError,
    ExecutionOutcome,
    InvalidArgument,
    RegistrationError,
  },
  execution::{
    ExecutionContext,
    Invocation,
  },
  help::CommandHelp,
  issuer::{
    CommandIssuer,
    MessageType,
  },
  messages::{
    Locales,
    Message,
    MessageCatalog,
    MessageKey,
  },
  param::BoundParameter,
  replacements::CommandReplacements,
  router,
  tree::{
    CommandTable,
    RootCommand,
  },
  types::{
    ParamType,
    Value,
  },
};

/// Resolver, condition, completion and replacement registries.
///
/// Lookups clone what they return out of the lock, so callbacks run with no
/// lock held and may call back into the manager. Completions are replaced
/// copy on write, so a lookup only clones the [`Arc`].
pub(crate) struct Registries {
  pub(crate) contexts:     RwLock<CommandContexts>,
  pub(crate) conditions:   RwLock<CommandConditions>,
  pub(crate) completions:  RwLock<Arc<CommandCompletions>>,
  pub(crate) replacements: RwLock<CommandReplacements>,
}

impl Registries {
  fn new(config: &ManagerConfig) -> Self {
    let mut replacements = CommandReplacements::new();
    replacements.add_all(
      config
        .replacements
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str())),
    );

    Self {
      contexts:     RwLock::new(CommandContexts::new()),
      conditions:   RwLock::new(CommandConditions::new()),
      completions:  RwLock::new(Arc::new(CommandCompletions::new())),
      replacements: RwLock::new(replacements),
    }
  }

  pub(crate) fn resolver(&self, ty: ParamType) -> Option<ContextResolver> {
    self.contexts.read().get(ty).cloned()
  }

  pub(crate) fn completions(&self) -> Arc<CommandCompletions> {
    self.completions.read().clone()
  }

  fn update_completions(&self, update: impl FnOnce(&mut CommandCompletions)) {
    let mut completions = self.completions.write();
    update(Arc::make_mut(&mut completions));
  }

  pub(crate) fn command_condition(&self, id: &str) -> Option<ConditionFn> {
    self.conditions.read().get(id)
  }

  /// A parameter condition for `ty` or a supertype, else a command condition
  /// of the same id.
  pub(crate) fn parameter_condition(&self, ty: ParamType, id: &str) -> Option<ParameterConditionFn> {
    let contexts = self.contexts.read();
    let conditions = self.conditions.read();
    if let Some(condition) = conditions.get_parameter(contexts.hierarchy(), ty, id) {
      return Some(condition);
    }
    let condition = conditions.get(id)?;
    Some(Arc::new(move |ctx: &ConditionContext<'_>, _: &Value| condition(ctx)))
  }

  /// The lowercased values a value restricted parameter accepts, with `@id`
  /// entries expanded through their completions.
  pub(crate) fn allowed_values(
    &self,
    values: &[String],
    issuer: &dyn CommandIssuer,
    input: &str,
    args: &[String],
  ) -> Vec<String> {
    let completions = self.completions();
    let mut allowed = IndexSet::new();
    for value in values {
      let expanded = completions.expand_now(value, issuer, input, args);
      if expanded.is_empty() {
        allowed.insert(value.to_lowercase());
      } else {
        allowed.extend(expanded.iter().map(|value| value.to_lowercase()));
      }
    }
    allowed.into_iter().collect()
  }
}

/// Owns the command table and dispatches lines against it.
pub struct CommandManager {
  table:             ArcSwap<CommandTable>,
  writer:            Mutex<()>,
  registries:        Registries,
  catalog:           RwLock<Arc<dyn MessageCatalog>>,
  exception_handler: RwLock<Option<ExceptionHandler>>,
  config:            ManagerConfig,
  next_group:        AtomicU64,
  next_order:        AtomicU64,
}

impl Default for CommandManager {
  fn default() -> Self {
    Self::new(ManagerConfig::default())
  }
}

impl CommandManager {
  pub fn new(config: ManagerConfig) -> Self {
    let catalog: Arc<dyn MessageCatalog> = Arc::new(Locales::with_overrides(&config.messages));
    Self {
      table: ArcSwap::from_pointee(CommandTable::new()),
      writer: Mutex::new(()),
      registries: Registries::new(&config),
      catalog: RwLock::new(catalog),
      exception_handler: RwLock::new(None),
      config,
      next_group: AtomicU64::new(1),
      next_order: AtomicU64::new(0),
    }
  }

  pub fn config(&self) -> &ManagerConfig {
    &self.config
  }

  /// Drops every registered command. Later dispatches report unknown
  /// commands; registries are kept.
  pub fn shutdown(&self) {
    let _guard = self.writer.lock();
    let roots = self.table.load().len();
    self.table.store(Arc::new(CommandTable::new()));
    tracing::info!(roots, "command manager shut down");
  }

  // Registration

  /// Registers every command of `group` under each of its root aliases.
  /// Nothing is registered if any signature is rejected.
  pub fn register_command(&self, group: CommandGroup) -> Result<GroupId, RegistrationError> {
    let aliases = group.root_aliases();
    let Some(primary) = aliases.first() else {
      return Err(RegistrationError::EmptyAlias);
    };
    let id = GroupId(self.next_group.fetch_add(1, Ordering::Relaxed));

    let _guard = self.writer.lock();
    let mut table = CommandTable::clone(&self.table.load());
    {
      let replacements = self.registries.replacements.read();
      let contexts = self.registries.contexts.read();
      let hierarchy = contexts.hierarchy();

      for flat in group.flatten() {
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        let paths = flat.paths.clone();
        let extra_roots = flat.root_aliases();
        let command = Arc::new(flat.bind(id, primary, order, &replacements, &contexts)?);

        for alias in &aliases {
          let root = table.root_mut(alias);
          for path in &paths {
            root.insert(path, command.clone(), hierarchy)?;
          }
          if command.catch_unknown {
            root.insert_catch_unknown(command.clone());
          }
        }
        for alias in &extra_roots {
          table.root_mut(alias).insert("", command.clone(), hierarchy)?;
        }
      }
    }
    self.table.store(Arc::new(table));

    tracing::debug!(group = ?id, aliases = ?aliases, "registered command group");
    Ok(id)
  }

  /// Removes every signature registered by `group`. Roots left without
  /// signatures are removed too.
  pub fn unregister_command(&self, group: GroupId) -> Result<(), RegistrationError> {
    let _guard = self.writer.lock();
    let mut table = CommandTable::clone(&self.table.load());
    if !table.remove_group(group) {
      return Err(RegistrationError::UnknownGroup(group));
    }
    self.table.store(Arc::new(table));
    tracing::debug!(?group, "unregistered command group");
    Ok(())
  }

  /// Registers `resolver` for `ty`. Commands registered earlier pick it up,
  /// along with the arity and usage text its kind implies.
  pub fn register_resolver(&self, ty: ParamType, resolver: ContextResolver) {
    let _guard = self.writer.lock();
    if self.registries.contexts.write().register(ty, resolver).is_some() {
      tracing::debug!(ty = ty.name(), "replaced context resolver");
    }
    self.rebind_table();
  }

  /// Publishes a table bound to the current resolvers. The caller holds the
  /// writer lock.
  fn rebind_table(&self) {
    let mut table = CommandTable::clone(&self.table.load());
    let rebound = table.rebind(&self.registries.contexts.read());
    if rebound > 0 {
      self.table.store(Arc::new(table));
      tracing::debug!(rebound, "rebound commands to changed resolvers");
    }
  }

  /// Resolver that consumes input tokens.
  pub fn register_context_resolver<T, F>(&self, resolve: F)
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<T, InvalidArgument> + Send + Sync + 'static,
  {
    self.register_resolver(ParamType::of::<T>(), ContextResolver::input(resolve));
  }

  /// Resolver that derives its value from the issuer without reading input.
  pub fn register_sender_aware_resolver<T, F>(&self, resolve: F)
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<T, InvalidArgument> + Send + Sync + 'static,
  {
    self.register_resolver(ParamType::of::<T>(), ContextResolver::issuer_only(resolve));
  }

  /// Resolver that reads a token when one is left and falls back to the
  /// issuer otherwise.
  pub fn register_issuer_aware_resolver<T, F>(&self, resolve: F)
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<T, InvalidArgument> + Send + Sync + 'static,
  {
    self.register_resolver(ParamType::of::<T>(), ContextResolver::issuer_aware(resolve));
  }

  /// Resolver that is also called when no input is left and may produce no
  /// value.
  pub fn register_optional_resolver<T, F>(&self, resolve: F)
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<Option<T>, InvalidArgument> + Send + Sync + 'static,
  {
    self.register_resolver(ParamType::of::<T>(), ContextResolver::optional(resolve));
  }

  /// Registers `E` as a parameter type and its variant names as the default
  /// completion for it.
  pub fn register_enum<E: CommandEnum>(&self) {
    {
      let _guard = self.writer.lock();
      self.registries.contexts.write().register_enum::<E>();
      self.rebind_table();
    }
    self.registries.update_completions(|completions| {
      completions.set_default(ParamType::of::<E>(), enum_names::<E>().join("|"));
    });
  }

  /// Lets `Sub` use resolvers, conditions and completions registered for
  /// `Super`. Returns false if that would create a cycle.
  pub fn declare_supertype<Sub: Any, Super: Any>(&self) -> bool {
    let _guard = self.writer.lock();
    let declared = self
      .registries
      .contexts
      .write()
      .hierarchy_mut()
      .declare(ParamType::of::<Sub>(), ParamType::of::<Super>());
    if declared {
      self.rebind_table();
    }
    declared
  }

  pub fn register_condition<F>(&self, id: &str, condition: F)
  where
    F: Fn(&ConditionContext<'_>) -> Result<(), ConditionFailed> + Send + Sync + 'static,
  {
    if self.registries.conditions.write().add(id, Arc::new(condition)).is_some() {
      tracing::debug!(id, "replaced condition");
    }
  }

  /// Condition on a resolved value of type `T`.
  pub fn register_parameter_condition<T, F>(&self, id: &str, condition: F)
  where
    T: Any,
    F: Fn(&ConditionContext<'_>, &T) -> Result<(), ConditionFailed> + Send + Sync + 'static,
  {
    self.register_value_condition(ParamType::of::<T>(), id, move |ctx, value| {
      match value.downcast_ref::<T>() {
        Some(value) => condition(ctx, value),
        None => {
          tracing::warn!(id = ctx.id, "parameter condition skipped, value has another type");
          Ok(())
        },
      }
    });
  }

  /// Condition on any resolved value of `ty` or one of its subtypes.
  pub fn register_value_condition<F>(&self, ty: ParamType, id: &str, condition: F)
  where
    F: Fn(&ConditionContext<'_>, &Value) -> Result<(), ConditionFailed> + Send + Sync + 'static,
  {
    self
      .registries
      .conditions
      .write()
      .add_parameter(ty, id, Arc::new(condition));
  }

  pub fn register_completion<F>(&self, id: &str, handler: F)
  where
    F: Fn(&CompletionContext<'_>) -> Result<Vec<String>, InvalidArgument> + Send + Sync + 'static,
  {
    self.register_completion_handler(id, CompletionHandler::Sync(Arc::new(handler)));
  }

  /// Completion computed off the calling thread. The handler only sees an
  /// owned [`CompletionRequest`].
  pub fn register_async_completion<F, Fut>(&self, id: &str, handler: F)
  where
    F: Fn(CompletionRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<String>> + Send + 'static,
  {
    self.register_completion_handler(
      id,
      CompletionHandler::Async(Arc::new(move |request| handler(request).boxed())),
    );
  }

  pub fn register_static_completion<I, S>(&self, id: &str, values: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let values = values.into_iter().map(Into::into).collect();
    self.register_completion_handler(id, CompletionHandler::Static(values));
  }

  fn register_completion_handler(&self, id: &str, handler: CompletionHandler) {
    self.registries.update_completions(|completions| {
      if completions.register(id, handler).is_some() {
        tracing::debug!(id, "replaced completion handler");
      }
    });
  }

  /// Completion used for parameters of `T` without an explicit one.
  pub fn set_default_completion<T: Any>(&self, completion: impl Into<String>) {
    self.registries.update_completions(|completions| {
      completions.set_default(ParamType::of::<T>(), completion);
    });
  }

  /// Adds a `%key` template. Only commands registered afterwards see it.
  pub fn add_replacement(&self, key: &str, value: impl Into<String>) {
    if !self.table.load().is_empty() {
      tracing::warn!(key, "replacement added after commands were registered");
    }
    self.registries.replacements.write().add(key, value);
  }

  /// Handler for failures of commands whose group has no handler of its own.
  pub fn set_default_exception_handler<F>(&self, handler: F)
  where
    F: Fn(&ExceptionContext<'_>) -> bool + Send + Sync + 'static,
  {
    *self.exception_handler.write() = Some(Arc::new(handler));
  }

  pub fn set_catalog(&self, catalog: impl MessageCatalog + 'static) {
    *self.catalog.write() = Arc::new(catalog);
  }

  // Queries

  pub fn root_command(&self, alias: &str) -> Option<Arc<RootCommand>> {
    self.table.load().get(alias).cloned()
  }

  pub fn aliases(&self) -> Vec<String> {
    self.table.load().aliases()
  }

  /// Whether the issuer may run anything under `alias`.
  pub fn has_any_permission(&self, issuer: &dyn CommandIssuer, alias: &str) -> bool {
    self
      .root_command(alias)
      .is_some_and(|root| root.has_any_permission(issuer))
  }

  /// Help listing of everything under `alias` that `issuer` may run.
  pub fn help(&self, issuer: &dyn CommandIssuer, alias: &str) -> Option<CommandHelp> {
    self
      .root_command(alias)
      .map(|root| CommandHelp::new(&root, issuer))
  }

  /// Sends the current page of `help` to `issuer`.
  pub fn show_help(&self, issuer: &dyn CommandIssuer, help: &CommandHelp) {
    let catalog = self.catalog.read().clone();
    for line in help.render(&*catalog) {
      issuer.send_message(MessageType::Info, &line);
    }
  }

  /// Renders `message` with the current catalog.
  pub fn format(&self, message: &Message) -> String {
    let catalog = self.catalog.read().clone();
    message.render(&*catalog)
  }

  pub fn send_message(&self, issuer: &dyn CommandIssuer, kind: MessageType, message: &Message) {
    issuer.send_message(kind, &self.format(message));
  }

  // Dispatch

  /// Runs a full line such as `"sc admin bob"`.
  pub fn dispatch_line(&self, issuer: &dyn CommandIssuer, line: &str) -> ExecutionOutcome {
    let (alias, rest, _) = command_line::split(line);
    self.dispatch(issuer, alias, &command_line::tokenize(rest))
  }

  /// Finds, resolves and invokes the command for `alias` and `args`.
  ///
  /// Every failure has been reported to the issuer by the time this returns.
  pub fn dispatch(&self, issuer: &dyn CommandIssuer, alias: &str, args: &[String]) -> ExecutionOutcome {
    let table = self.table.load();
    let Some(root) = table.get(alias) else {
      tracing::debug!(alias, issuer = issuer.name(), "unknown command");
      if self.config.unknown_command == UnknownCommandPolicy::Report {
        self.send_message(issuer, MessageType::Error, &MessageKey::UnknownCommand.into());
      }
      return ExecutionOutcome::Failed(DispatchError::UnknownCommand {
        alias: alias.to_string(),
      });
    };

    let Some(route) = router::route(root, args) else {
      self.send_message(issuer, MessageType::Error, &MessageKey::UnknownCommand.into());
      return ExecutionOutcome::Failed(DispatchError::NoMatchingCommand {
        command: root.name().to_string(),
      });
    };

    let Some(command) = router::select(&route.candidates, route.args.len(), false) else {
      let command = format!("{} {}", root.name(), route.path).trim_end().to_string();
      match route.candidates.first() {
        Some(first) => self.send_syntax(issuer, first),
        None => self.send_message(issuer, MessageType::Error, &MessageKey::UnknownCommand.into()),
      }
      return ExecutionOutcome::Failed(DispatchError::NoMatchingCommand { command });
    };

    tracing::debug!(command = command.command(), issuer = issuer.name(), "dispatching");
    match self.execute(issuer, alias, &command, &route.args) {
      Ok(()) => ExecutionOutcome::Succeeded,
      Err(err) => {
        self.report(issuer, &command, &err);
        ExecutionOutcome::Failed(err)
      },
    }
  }

  fn execute(
    &self,
    issuer: &dyn CommandIssuer,
    label: &str,
    command: &RegisteredCommand,
    args: &[String],
  ) -> Result<(), DispatchError> {
    if !command.has_permission(issuer) {
      return Err(DispatchError::PermissionDenied { parameter: None });
    }

    let resolved = command.resolve_args(issuer, args, &self.registries)?;
    let invocation = Invocation {
      issuer,
      label,
      command: command.command(),
      args: &resolved,
    };

    let err = match panic::catch_unwind(AssertUnwindSafe(|| command.invoke(&invocation))) {
      Ok(Ok(())) => return Ok(()),
      Ok(Err(err)) => err,
      Err(payload) => anyhow::anyhow!("command handler panicked: {}", panic_message(&*payload)),
    };
    let err = match err.downcast::<InvalidArgument>() {
      Ok(invalid) => return Err(invalid.into()),
      Err(err) => err,
    };
    let err = match err.downcast::<ConditionFailed>() {
      Ok(failed) => return Err(failed.into()),
      Err(err) => err,
    };

    tracing::error!(command = command.command(), "command handler failed: {err:?}");
    let handler = command
      .exception_handler
      .clone()
      .or_else(|| self.exception_handler.read().clone());
    let handled = handler.is_some_and(|handler| {
      handler(&ExceptionContext {
        issuer,
        command,
        args,
        error: &err,
      })
    });

    Err(DispatchError::HandlerFailed {
      message: err.to_string(),
      handled,
    })
  }

  fn report(&self, issuer: &dyn CommandIssuer, command: &RegisteredCommand, err: &DispatchError) {
    match err {
      DispatchError::PermissionDenied { parameter: None } => {
        self.send_message(issuer, MessageType::Error, &MessageKey::PermissionDenied.into());
      },
      DispatchError::PermissionDenied {
        parameter: Some(parameter),
      } => {
        let message = Message::key(MessageKey::PermissionDeniedParameter).with("param", parameter);
        self.send_message(issuer, MessageType::Error, &message);
      },
      DispatchError::InvalidArgument(invalid) => {
        self.send_error(issuer, &invalid.message);
        if invalid.show_syntax {
          self.send_syntax(issuer, command);
        }
      },
      DispatchError::ConditionFailed(failed) => self.send_error(issuer, &failed.message),
      DispatchError::MissingArgument { parameter } => {
        let message = Message::key(MessageKey::MissingArgument).with("name", parameter);
        self.send_message(issuer, MessageType::Error, &message);
        self.send_syntax(issuer, command);
      },
      DispatchError::ResolverNotFound { .. } | DispatchError::UnknownCondition { .. } => {
        tracing::error!(%err, command = command.command(), "command is misconfigured");
        self.send_message(issuer, MessageType::Error, &MessageKey::ErrorGenericLogged.into());
      },
      DispatchError::HandlerFailed { handled: true, .. } => {},
      DispatchError::HandlerFailed { handled: false, .. } => {
        self.send_message(issuer, MessageType::Error, &MessageKey::ErrorPerformingCommand.into());
      },
      DispatchError::UnknownCommand { .. } | DispatchError::NoMatchingCommand { .. } => {
        self.send_message(issuer, MessageType::Error, &MessageKey::UnknownCommand.into());
      },
    }
  }

  /// Raw text goes through the error prefix; an empty raw message sends
  /// nothing.
  fn send_error(&self, issuer: &dyn CommandIssuer, message: &Message) {
    match message {
      Message::Raw(text) if text.is_empty() => {},
      Message::Raw(text) => {
        let message = Message::key(MessageKey::ErrorPrefix).with("message", text.as_str());
        self.send_message(issuer, MessageType::Error, &message);
      },
      message => self.send_message(issuer, MessageType::Error, message),
    }
  }

  fn send_syntax(&self, issuer: &dyn CommandIssuer, command: &RegisteredCommand) {
    let message = Message::key(MessageKey::InvalidSyntax)
      .with("command", command.command())
      .with("syntax", command.syntax());
    issuer.send_message(MessageType::Syntax, self.format(&message).trim_end());
  }

  // Completion

  /// Completes a full line. Without a space after the alias, suggests
  /// aliases instead.
  pub fn complete_line(&self, issuer: &dyn CommandIssuer, line: &str) -> Vec<String> {
    futures_executor::block_on(self.complete_line_async(issuer, line))
  }

  pub fn complete_line_async(
    &self,
    issuer: &dyn CommandIssuer,
    line: &str,
  ) -> BoxFuture<'static, Vec<String>> {
    let (alias, rest, completing_alias) = command_line::split(line);
    if completing_alias {
      return future::ready(self.complete_alias(issuer, alias)).boxed();
    }
    let (args, partial) = command_line::tokenize_partial(rest);
    self.complete_async(issuer, alias, &args, &partial)
  }

  /// Root aliases starting with `partial` that the issuer may use.
  pub fn complete_alias(&self, issuer: &dyn CommandIssuer, partial: &str) -> Vec<String> {
    let partial = partial.to_lowercase();
    let table = self.table.load();
    table
      .aliases()
      .into_iter()
      .filter(|alias| alias.starts_with(&partial))
      .filter(|alias| table.get(alias).is_some_and(|root| root.has_any_permission(issuer)))
      .collect()
  }

  /// Blocking form of [`CommandManager::complete_async`].
  pub fn complete(
    &self,
    issuer: &dyn CommandIssuer,
    alias: &str,
    args: &[String],
    partial: &str,
  ) -> Vec<String> {
    futures_executor::block_on(self.complete_async(issuer, alias, args, partial))
  }

  /// Suggestions for `partial`, the token being typed after `args`.
  ///
  /// Permission checks and synchronous handlers run before this returns; the
  /// future only waits on asynchronous handlers. It borrows nothing, so a
  /// caller that no longer wants the answer can simply drop it.
  pub fn complete_async(
    &self,
    issuer: &dyn CommandIssuer,
    alias: &str,
    args: &[String],
    partial: &str,
  ) -> BoxFuture<'static, Vec<String>> {
    let table = self.table.load();
    let Some(root) = table.get(alias) else {
      return future::ready(Vec::new()).boxed();
    };

    let mut full = args.to_vec();
    full.push(partial.to_string());

    let mut pending = vec![PendingCompletion::Ready(router::subcommand_suggestions(
      root, issuer, &full,
    ))];
    // An empty remainder means the sub-command word itself is being typed.
    let route = router::route(root, &full).filter(|route| !route.args.is_empty());
    if let Some(route) = route {
      if let Some(command) = router::select(&route.candidates, route.args.len(), true) {
        pending.extend(self.complete_command(issuer, &command, &route.args, partial));
      }
    }

    let prefix = self.config.filter_completions.then(|| partial.to_lowercase());
    async move {
      let mut suggestions = IndexSet::new();
      for pending in pending {
        let values = match pending {
          PendingCompletion::Ready(values) => values,
          PendingCompletion::Pending(future) => future.await,
        };
        suggestions.extend(values);
      }
      suggestions
        .into_iter()
        .filter(|value| {
          prefix
            .as_deref()
            .is_none_or(|prefix| value.to_lowercase().starts_with(prefix))
        })
        .collect()
    }
    .boxed()
  }

  fn complete_command(
    &self,
    issuer: &dyn CommandIssuer,
    command: &RegisteredCommand,
    args: &[String],
    partial: &str,
  ) -> Vec<PendingCompletion> {
    if !command.has_permission(issuer) {
      return Vec::new();
    }
    let Some(index) = args.len().checked_sub(1) else {
      return Vec::new();
    };
    let inputs = command.input_params().count();
    if index >= inputs && !command.consumes_rest() {
      return Vec::new();
    }
    let param = command.input_params().nth(index.min(inputs.saturating_sub(1)));
    let permitted = |param: &BoundParameter| {
      issuer.has_all_permissions(param.permissions.iter().map(String::as_str))
    };
    if param.is_some_and(|param| !permitted(param)) {
      return Vec::new();
    }

    let completions = self.registries.completions();
    let completion = {
      let contexts = self.registries.contexts.read();
      completions.completion_for(contexts.hierarchy(), command, index)
    };
    let Some(completion) = completion else {
      return Vec::new();
    };
    tracing::debug!(command = command.command(), index, %completion, "completing");
    completions.expand(&completion, issuer, partial, args)
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  payload
    .downcast_ref::<&str>()
    .copied()
    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
    .unwrap_or("non-string panic payload")
}
