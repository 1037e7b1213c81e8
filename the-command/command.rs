//! Command declarations and their bound, dispatchable form.
//!
//! A [`CommandGroup`] is the unit of registration: a set of root aliases, the
//! [`CommandSpec`]s reachable under them and any nested groups. Registration
//! flattens a group into [`RegisteredCommand`]s, one per spec, each carrying
//! everything it inherited from its enclosing groups.

use std::{
  collections::{
    HashSet,
    VecDeque,
  },
  fmt,
  sync::Arc,
};

use crate::{
  command_line,
  conditions::{
    ConditionContext,
    ConditionSpec,
    parse_conditions,
  },
  contexts::{
    CommandContexts,
    ResolverKind,
  },
  error::{
    DispatchError,
    InvalidArgument,
    RegistrationError,
  },
  execution::{
    ExecutionContext,
    Invocation,
    ResolvedArgs,
  },
  flags::Flags,
  issuer::CommandIssuer,
  manager::Registries,
  messages::{
    Message,
    MessageKey,
  },
  param::{
    BoundParameter,
    Parameter,
    split_permissions,
  },
  replacements::CommandReplacements,
  types::ParamType,
};

/// Identifies one registered [`CommandGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u64);

pub type CommandHandler = Arc<dyn Fn(&Invocation<'_>) -> anyhow::Result<()> + Send + Sync>;

/// What an exception handler gets when a command handler fails.
pub struct ExceptionContext<'a> {
  pub issuer:  &'a dyn CommandIssuer,
  pub command: &'a RegisteredCommand,
  pub args:    &'a [String],
  pub error:   &'a anyhow::Error,
}

/// Returns true when the failure has been reported and the generic error
/// message should be suppressed.
pub type ExceptionHandler = Arc<dyn Fn(&ExceptionContext<'_>) -> bool + Send + Sync>;

/// One handler signature and the path it is reachable under.
#[derive(Clone)]
pub struct CommandSpec {
  path:          String,
  params:        Vec<Parameter>,
  handler:       CommandHandler,
  permission:    Option<String>,
  conditions:    Option<String>,
  completion:    Option<String>,
  description:   Option<String>,
  syntax:        Option<String>,
  root_aliases:  Vec<String>,
  catch_unknown: bool,
  private:       bool,
}

impl fmt::Debug for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CommandSpec")
      .field("path", &self.path)
      .field("params", &self.params)
      .finish_non_exhaustive()
  }
}

impl CommandSpec {
  /// A signature under `path`: space separated words, alternatives
  /// separated by `|`, e.g. `"remove|rm"` or `"perm add"`. An empty path is
  /// the default command of the group.
  pub fn new<F>(path: impl Into<String>, handler: F) -> Self
  where
    F: Fn(&Invocation<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    Self {
      path:          path.into(),
      params:        Vec::new(),
      handler:       Arc::new(handler),
      permission:    None,
      conditions:    None,
      completion:    None,
      description:   None,
      syntax:        None,
      root_aliases:  Vec::new(),
      catch_unknown: false,
      private:       false,
    }
  }

  pub fn default_command<F>(handler: F) -> Self
  where
    F: Fn(&Invocation<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    Self::new("", handler)
  }

  pub fn param(mut self, param: Parameter) -> Self {
    self.params.push(param);
    self
  }

  /// Comma separated permissions, all of which are required.
  pub fn permission(mut self, permission: impl Into<String>) -> Self {
    self.permission = Some(permission.into());
    self
  }

  pub fn conditions(mut self, conditions: impl Into<String>) -> Self {
    self.conditions = Some(conditions.into());
    self
  }

  /// Space separated completions, one per parameter that consumes input.
  pub fn completion(mut self, completion: impl Into<String>) -> Self {
    self.completion = Some(completion.into());
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn syntax(mut self, syntax: impl Into<String>) -> Self {
    self.syntax = Some(syntax.into());
    self
  }

  /// Also reachable as the default command of the root alias `alias`.
  pub fn root_alias(mut self, alias: impl Into<String>) -> Self {
    self.root_aliases.push(alias.into());
    self
  }

  /// Used when neither a path nor a default command matches.
  pub fn catch_unknown(mut self) -> Self {
    self.catch_unknown = true;
    self
  }

  /// Hidden from sub-command name suggestions and help.
  pub fn private(mut self) -> Self {
    self.private = true;
    self
  }
}

/// A set of commands registered and unregistered together.
#[derive(Clone)]
pub struct CommandGroup {
  aliases:           String,
  permission:        Option<String>,
  conditions:        Option<String>,
  description:       Option<String>,
  context_flags:     Vec<(ParamType, String)>,
  exception_handler: Option<ExceptionHandler>,
  commands:          Vec<CommandSpec>,
  subgroups:         Vec<(String, CommandGroup)>,
}

impl fmt::Debug for CommandGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CommandGroup")
      .field("aliases", &self.aliases)
      .field("commands", &self.commands)
      .field("subgroups", &self.subgroups)
      .finish_non_exhaustive()
  }
}

impl CommandGroup {
  /// A group reachable under the pipe separated root `aliases`.
  pub fn new(aliases: impl Into<String>) -> Self {
    Self {
      aliases:           aliases.into(),
      permission:        None,
      conditions:        None,
      description:       None,
      context_flags:     Vec::new(),
      exception_handler: None,
      commands:          Vec::new(),
      subgroups:         Vec::new(),
    }
  }

  /// Permission required by every command of the group, nested groups
  /// included.
  pub fn permission(mut self, permission: impl Into<String>) -> Self {
    self.permission = Some(permission.into());
    self
  }

  /// Conditions checked before every command of the group.
  pub fn conditions(mut self, conditions: impl Into<String>) -> Self {
    self.conditions = Some(conditions.into());
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// Flags applied to every parameter of type `T` or a subtype, unless the
  /// parameter sets the same key.
  pub fn context_flags<T: 'static>(mut self, flags: impl Into<String>) -> Self {
    self.context_flags.push((ParamType::of::<T>(), flags.into()));
    self
  }

  pub fn exception_handler<F>(mut self, handler: F) -> Self
  where
    F: Fn(&ExceptionContext<'_>) -> bool + Send + Sync + 'static,
  {
    self.exception_handler = Some(Arc::new(handler));
    self
  }

  pub fn command(mut self, command: CommandSpec) -> Self {
    self.commands.push(command);
    self
  }

  /// Nests `group` under the sub-command `prefix` (alternatives separated by
  /// `|`). The nested group's own aliases are ignored.
  pub fn subgroup(mut self, prefix: impl Into<String>, group: CommandGroup) -> Self {
    self.subgroups.push((prefix.into(), group));
    self
  }

  pub(crate) fn root_aliases(&self) -> Vec<String> {
    split_alternatives(&self.aliases)
      .into_iter()
      .filter(|alias| !alias.is_empty())
      .collect()
  }

  pub(crate) fn flatten(&self) -> Vec<FlatCommand> {
    let mut out = Vec::new();
    self.flatten_into(&[String::new()], &Inherited::default(), &mut out);
    out
  }

  fn flatten_into(&self, prefixes: &[String], parent: &Inherited, out: &mut Vec<FlatCommand>) {
    let mut inherited = parent.clone();
    inherited.permissions.extend(self.permission.clone());
    inherited.conditions.extend(self.conditions.clone());
    // Nearer groups win, so they go first.
    let mut context_flags = self.context_flags.clone();
    context_flags.extend(parent.context_flags.iter().cloned());
    inherited.context_flags = context_flags;
    if self.exception_handler.is_some() {
      inherited.exception_handler = self.exception_handler.clone();
    }

    for spec in &self.commands {
      out.push(FlatCommand {
        paths:     join_paths(prefixes, &split_alternatives(&spec.path)),
        spec:      spec.clone(),
        inherited: inherited.clone(),
      });
    }

    for (prefix, group) in &self.subgroups {
      let prefixes = join_paths(prefixes, &split_alternatives(prefix));
      group.flatten_into(&prefixes, &inherited, out);
    }
  }
}

/// Lowercased, trimmed `|` alternatives. Always yields at least one entry.
fn split_alternatives(text: &str) -> Vec<String> {
  let mut seen = HashSet::new();
  text
    .split('|')
    .map(|alt| {
      alt
        .split(' ')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    })
    .filter(|alt| seen.insert(alt.clone()))
    .collect()
}

fn join_paths(prefixes: &[String], paths: &[String]) -> Vec<String> {
  let mut out = Vec::new();
  for prefix in prefixes {
    for path in paths {
      let joined = match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.clone(),
        (false, true) => prefix.clone(),
        (false, false) => format!("{prefix} {path}"),
      };
      if !out.contains(&joined) {
        out.push(joined);
      }
    }
  }
  out
}

#[derive(Clone, Default)]
pub(crate) struct Inherited {
  permissions:       Vec<String>,
  conditions:        Vec<String>,
  context_flags:     Vec<(ParamType, String)>,
  exception_handler: Option<ExceptionHandler>,
}

/// A [`CommandSpec`] with its full paths and everything inherited from its
/// groups.
#[derive(Clone)]
pub(crate) struct FlatCommand {
  pub(crate) paths:     Vec<String>,
  pub(crate) spec:      CommandSpec,
  pub(crate) inherited: Inherited,
}

impl FlatCommand {
  pub(crate) fn root_aliases(&self) -> Vec<String> {
    self
      .spec
      .root_aliases
      .iter()
      .flat_map(|alias| split_alternatives(alias))
      .filter(|alias| !alias.is_empty())
      .collect()
  }

  pub(crate) fn bind(
    self,
    group: GroupId,
    root: &str,
    order: u64,
    replacements: &CommandReplacements,
    contexts: &CommandContexts,
  ) -> Result<RegisteredCommand, RegistrationError> {
    let path = self.paths.first().cloned().unwrap_or_default();
    let command = if path.is_empty() {
      root.to_string()
    } else {
      format!("{root} {path}")
    };

    let context_flags: Vec<_> = self
      .inherited
      .context_flags
      .iter()
      .map(|(ty, flags)| (*ty, Flags::parse(&replacements.replace(flags))))
      .collect();

    let mut params = Vec::with_capacity(self.spec.params.len());
    let mut names = HashSet::new();
    for param in self.spec.params {
      if !names.insert(param.name.clone()) {
        return Err(RegistrationError::DuplicateParameter {
          command,
          parameter: param.name,
        });
      }
      params.push(BoundParameter::bind(param, replacements, contexts, &context_flags)?);
    }
    let count = params.len();
    if let Some(misplaced) = params
      .iter()
      .take(count.saturating_sub(1))
      .find(|param| param.must_be_last())
    {
      return Err(RegistrationError::MisplacedRestParameter {
        command,
        parameter: misplaced.name.clone(),
      });
    }

    let mut permissions = Vec::new();
    for permission in self.inherited.permissions.iter().chain(&self.spec.permission) {
      for permission in split_permissions(&replacements.replace(permission)) {
        if !permissions.contains(&permission) {
          permissions.push(permission);
        }
      }
    }

    let conditions = self
      .inherited
      .conditions
      .iter()
      .chain(&self.spec.conditions)
      .flat_map(|conditions| parse_conditions(&replacements.replace(conditions)))
      .collect();

    let completion = self
      .spec
      .completion
      .as_deref()
      .map(|completion| {
        replacements
          .replace(completion)
          .split(' ')
          .filter(|entry| !entry.is_empty())
          .map(str::to_string)
          .collect()
      })
      .unwrap_or_default();

    let arity = Arity::of(&params);
    let syntax = match &self.spec.syntax {
      Some(syntax) => replacements.replace(syntax),
      None => generated_syntax(&params),
    };

    Ok(RegisteredCommand {
      group,
      command,
      path,
      params,
      handler: self.spec.handler,
      permissions,
      conditions,
      completion,
      description: self.spec.description,
      explicit_syntax: self.spec.syntax.is_some(),
      syntax,
      required: arity.required,
      optional: arity.optional,
      sender_aware: arity.sender_aware,
      order,
      catch_unknown: self.spec.catch_unknown,
      private: self.spec.private,
      exception_handler: self.inherited.exception_handler,
    })
  }
}

/// How many parameters need input, may take input, or never read any.
struct Arity {
  required:     usize,
  optional:     usize,
  sender_aware: usize,
}

impl Arity {
  fn of(params: &[BoundParameter]) -> Self {
    Self {
      required:     params.iter().filter(|param| param.requires_input()).count(),
      optional:     params
        .iter()
        .filter(|param| param.consumes_input() && !param.requires_input())
        .count(),
      sender_aware: params.iter().filter(|param| !param.consumes_input()).count(),
    }
  }
}

fn generated_syntax(params: &[BoundParameter]) -> String {
  params
    .iter()
    .filter_map(BoundParameter::syntax_text)
    .collect::<Vec<_>>()
    .join(" ")
}

/// One bound, dispatchable signature.
pub struct RegisteredCommand {
  pub(crate) group:             GroupId,
  pub(crate) command:           String,
  pub(crate) path:              String,
  pub(crate) params:            Vec<BoundParameter>,
  pub(crate) handler:           CommandHandler,
  pub(crate) permissions:       Vec<String>,
  pub(crate) conditions:        Vec<ConditionSpec>,
  pub(crate) completion:        Vec<String>,
  pub(crate) description:       Option<String>,
  pub(crate) explicit_syntax:   bool,
  pub(crate) syntax:            String,
  pub(crate) required:          usize,
  pub(crate) optional:          usize,
  pub(crate) sender_aware:      usize,
  pub(crate) order:             u64,
  pub(crate) catch_unknown:     bool,
  pub(crate) private:           bool,
  pub(crate) exception_handler: Option<ExceptionHandler>,
}

impl fmt::Debug for RegisteredCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegisteredCommand")
      .field("command", &self.command)
      .field("syntax", &self.syntax)
      .field("required", &self.required)
      .field("optional", &self.optional)
      .field("sender_aware", &self.sender_aware)
      .finish_non_exhaustive()
  }
}

impl RegisteredCommand {
  pub fn group(&self) -> GroupId {
    self.group
  }

  /// Primary root alias and path, e.g. `"sc admin"`.
  pub fn command(&self) -> &str {
    &self.command
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn syntax(&self) -> &str {
    &self.syntax
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn permissions(&self) -> &[String] {
    &self.permissions
  }

  pub fn params(&self) -> &[BoundParameter] {
    &self.params
  }

  pub fn completion(&self) -> &[String] {
    &self.completion
  }

  pub fn required_count(&self) -> usize {
    self.required
  }

  pub fn optional_count(&self) -> usize {
    self.optional
  }

  pub fn sender_aware_count(&self) -> usize {
    self.sender_aware
  }

  pub fn is_private(&self) -> bool {
    self.private
  }

  pub fn input_params(&self) -> impl Iterator<Item = &BoundParameter> {
    self.params.iter().filter(|param| param.consumes_input())
  }

  /// Whether the last parameter takes every remaining token.
  pub fn consumes_rest(&self) -> bool {
    self
      .params
      .last()
      .is_some_and(|param| param.consumes_input() && param.consumes_rest(true))
  }

  pub fn has_permission(&self, issuer: &dyn CommandIssuer) -> bool {
    issuer.has_all_permissions(self.permissions.iter().map(String::as_str))
  }

  /// A copy bound to the resolvers currently in `contexts`, with arity and
  /// generated syntax recomputed. `None` if no parameter's resolver changed.
  pub(crate) fn rebind(&self, contexts: &CommandContexts) -> Option<Self> {
    let mut changed = false;
    let mut params = Vec::with_capacity(self.params.len());
    for param in &self.params {
      let resolver = contexts.get(param.ty).cloned();
      changed |= match (&param.resolver, &resolver) {
        (Some(old), Some(new)) => !old.same_as(new),
        (None, None) => false,
        _ => true,
      };
      params.push(BoundParameter {
        resolver,
        ..param.clone()
      });
    }
    if !changed {
      return None;
    }

    let arity = Arity::of(&params);
    let syntax = if self.explicit_syntax {
      self.syntax.clone()
    } else {
      generated_syntax(&params)
    };
    Some(Self {
      group: self.group,
      command: self.command.clone(),
      path: self.path.clone(),
      params,
      handler: self.handler.clone(),
      permissions: self.permissions.clone(),
      conditions: self.conditions.clone(),
      completion: self.completion.clone(),
      description: self.description.clone(),
      explicit_syntax: self.explicit_syntax,
      syntax,
      required: arity.required,
      optional: arity.optional,
      sender_aware: arity.sender_aware,
      order: self.order,
      catch_unknown: self.catch_unknown,
      private: self.private,
      exception_handler: self.exception_handler.clone(),
    })
  }

  /// Runs command conditions, then resolves every parameter left to right.
  pub(crate) fn resolve_args(
    &self,
    issuer: &dyn CommandIssuer,
    args: &[String],
    registries: &Registries,
  ) -> Result<ResolvedArgs, DispatchError> {
    let mut resolved = ResolvedArgs::new();

    for spec in &self.conditions {
      let condition = registries
        .command_condition(&spec.id)
        .ok_or_else(|| DispatchError::UnknownCondition { id: spec.id.clone() })?;
      condition(&ConditionContext {
        issuer,
        id: &spec.id,
        config: &spec.config,
        command: &self.command,
        resolved: &resolved,
        parameter: None,
      })?;
    }

    let mut remaining: VecDeque<String> = args.iter().cloned().collect();
    let count = self.params.len();
    for (index, param) in self.params.iter().enumerate() {
      let is_last = index + 1 == count;
      let resolver = match &param.resolver {
        Some(resolver) => resolver.clone(),
        None => registries
          .resolver(param.ty)
          .ok_or(DispatchError::ResolverNotFound {
            type_name: param.ty.name(),
          })?,
      };

      let value = if resolver.kind() == ResolverKind::IssuerOnly {
        let mut ctx =
          ExecutionContext::new(issuer, &self.command, param, index, is_last, &mut remaining, &resolved);
        match resolver.resolve(&mut ctx) {
          Ok(value) => value,
          Err(err) if param.optional => {
            tracing::debug!(%err, parameter = %param.name, "issuer could not supply optional value");
            None
          },
          Err(err) => return Err(err.into()),
        }
      } else {
        if !remaining.is_empty()
          && !issuer.has_all_permissions(param.permissions.iter().map(String::as_str))
        {
          return Err(DispatchError::PermissionDenied {
            parameter: Some(param.name.clone()),
          });
        }

        // A required trailing list resolves empty input itself.
        let trailing_list = is_last && param.ty.is::<Vec<String>>();
        if remaining.is_empty() && (!trailing_list || param.optional) {
          match &param.default {
            Some(default) if trailing_list && param.split.is_none() => {
              remaining.extend(command_line::tokenize(default));
            },
            Some(default) => remaining.push_back(default.clone()),
            None if param.optional && !resolver.kind().accepts_missing_input() => {
              resolved.insert(&param.name, None);
              continue;
            },
            None if param.optional || resolver.kind().accepts_missing_input() => {},
            None => {
              return Err(DispatchError::MissingArgument {
                parameter: param.name.clone(),
              });
            },
          }
        }

        if let Some(values) = &param.values {
          let token = remaining.front().cloned().unwrap_or_default();
          let allowed = registries.allowed_values(values, issuer, &token, args);
          let wanted = token.to_lowercase();
          if !allowed.contains(&wanted) {
            return Err(
              InvalidArgument::key(
                Message::key(MessageKey::PleaseSpecifyOneOf).with("valid", allowed.join(", ")),
              )
              .into(),
            );
          }
        }

        let mut ctx =
          ExecutionContext::new(issuer, &self.command, param, index, is_last, &mut remaining, &resolved);
        resolver.resolve(&mut ctx)?
      };

      if let Some(value) = &value {
        for spec in &param.conditions {
          let condition = registries
            .parameter_condition(param.ty, &spec.id)
            .ok_or_else(|| DispatchError::UnknownCondition { id: spec.id.clone() })?;
          condition(
            &ConditionContext {
              issuer,
              id: &spec.id,
              config: &spec.config,
              command: &self.command,
              resolved: &resolved,
              parameter: Some(&param.name),
            },
            value,
          )?;
        }
      }

      resolved.insert(&param.name, value);
    }

    Ok(resolved)
  }

  pub(crate) fn invoke(&self, invocation: &Invocation<'_>) -> anyhow::Result<()> {
    (self.handler)(invocation)
  }
}
