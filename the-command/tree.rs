//! The alias table and the per-alias sub-command multimap.
//!
//! Both are plain values rebuilt on every registration change and published
//! as a whole, so readers always see one consistent table.

use std::{
  collections::{
    HashMap,
    HashSet,
  },
  sync::Arc,
};

use indexmap::IndexMap;

use crate::{
  command::{
    GroupId,
    RegisteredCommand,
  },
  contexts::CommandContexts,
  error::RegistrationError,
  issuer::CommandIssuer,
  types::TypeHierarchy,
};

/// Every signature reachable under one root alias, keyed by sub-command
/// path. The empty path holds the default signatures.
#[derive(Debug, Clone)]
pub struct RootCommand {
  name:          String,
  subcommands:   IndexMap<String, Vec<Arc<RegisteredCommand>>>,
  catch_unknown: Vec<Arc<RegisteredCommand>>,
}

impl RootCommand {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:          name.into(),
      subcommands:   IndexMap::new(),
      catch_unknown: Vec::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Signatures registered under `path`, in registration order.
  pub fn commands(&self, path: &str) -> &[Arc<RegisteredCommand>] {
    self.subcommands.get(path).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn default_commands(&self) -> &[Arc<RegisteredCommand>] {
    self.commands("")
  }

  pub fn catch_unknown(&self) -> &[Arc<RegisteredCommand>] {
    &self.catch_unknown
  }

  /// Sub-command paths, the default path excluded.
  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self
      .subcommands
      .keys()
      .map(String::as_str)
      .filter(|path| !path.is_empty())
  }

  pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &[Arc<RegisteredCommand>])> {
    self
      .subcommands
      .iter()
      .map(|(path, commands)| (path.as_str(), commands.as_slice()))
  }

  /// Every distinct signature of this root.
  pub fn all_commands(&self) -> Vec<Arc<RegisteredCommand>> {
    let mut all: Vec<Arc<RegisteredCommand>> = Vec::new();
    for command in self.subcommands.values().flatten().chain(&self.catch_unknown) {
      if !all.iter().any(|seen| Arc::ptr_eq(seen, command)) {
        all.push(command.clone());
      }
    }
    all
  }

  pub fn is_empty(&self) -> bool {
    self.subcommands.is_empty() && self.catch_unknown.is_empty()
  }

  /// Description of the first default signature that has one.
  pub fn description(&self) -> Option<&str> {
    self
      .default_commands()
      .iter()
      .find_map(|command| command.description())
  }

  /// The single permission shared by every signature, if there is one.
  pub fn unique_permission(&self) -> Option<&str> {
    let mut commands = self.subcommands.values().flatten().chain(&self.catch_unknown);
    let [permission] = commands.next()?.permissions() else {
      return None;
    };
    commands
      .all(|command| command.permissions() == std::slice::from_ref(permission))
      .then_some(permission.as_str())
  }

  /// Whether the issuer may run at least one signature.
  pub fn has_any_permission(&self, issuer: &dyn CommandIssuer) -> bool {
    self
      .subcommands
      .values()
      .flatten()
      .chain(&self.catch_unknown)
      .any(|command| command.has_permission(issuer))
  }

  pub(crate) fn insert(
    &mut self,
    path: &str,
    command: Arc<RegisteredCommand>,
    hierarchy: &TypeHierarchy,
  ) -> Result<(), RegistrationError> {
    let existing = self.subcommands.entry(path.to_string()).or_default();
    for other in existing.iter() {
      if Arc::ptr_eq(other, &command) {
        return Ok(());
      }
      if ambiguous(other, &command, hierarchy) {
        return Err(RegistrationError::AmbiguousOverload {
          command: format!("{} {}", self.name, path).trim_end().to_string(),
          first:   other.syntax().to_string(),
          second:  command.syntax().to_string(),
        });
      }
    }
    existing.push(command);
    Ok(())
  }

  pub(crate) fn insert_catch_unknown(&mut self, command: Arc<RegisteredCommand>) {
    if !self.catch_unknown.iter().any(|other| Arc::ptr_eq(other, &command)) {
      self.catch_unknown.push(command);
    }
  }

  /// Drops every signature of `group`. Returns whether anything was removed.
  pub(crate) fn remove_group(&mut self, group: GroupId) -> bool {
    let before = self.len();
    for commands in self.subcommands.values_mut() {
      commands.retain(|command| command.group() != group);
    }
    self.subcommands.retain(|_, commands| !commands.is_empty());
    self.catch_unknown.retain(|command| command.group() != group);
    before != self.len()
  }

  fn replace_commands(
    &mut self,
    rebound: &HashMap<*const RegisteredCommand, Arc<RegisteredCommand>>,
  ) {
    let commands = self
      .subcommands
      .values_mut()
      .flatten()
      .chain(self.catch_unknown.iter_mut());
    for command in commands {
      if let Some(fresh) = rebound.get(&Arc::as_ptr(command)) {
        *command = fresh.clone();
      }
    }
  }

  fn len(&self) -> usize {
    self.subcommands.values().map(Vec::len).sum::<usize>() + self.catch_unknown.len()
  }
}

/// Two signatures under the same path that no input could tell apart before
/// resolution: equal required arity and pairwise related required types.
fn ambiguous(a: &RegisteredCommand, b: &RegisteredCommand, hierarchy: &TypeHierarchy) -> bool {
  if a.required_count() != b.required_count() {
    return false;
  }
  let required = |command: &RegisteredCommand| {
    command
      .params()
      .iter()
      .filter(|param| param.requires_input())
      .map(|param| param.ty())
      .collect::<Vec<_>>()
  };
  required(a)
    .into_iter()
    .zip(required(b))
    .all(|(a, b)| hierarchy.is_related(a, b))
}

/// Root commands by lowercase alias.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
  roots: HashMap<String, Arc<RootCommand>>,
}

impl CommandTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, alias: &str) -> Option<&Arc<RootCommand>> {
    self.roots.get(&alias.to_lowercase())
  }

  /// Registered aliases, sorted.
  pub fn aliases(&self) -> Vec<String> {
    let mut aliases: Vec<_> = self.roots.keys().cloned().collect();
    aliases.sort();
    aliases
  }

  pub fn len(&self) -> usize {
    self.roots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.roots.is_empty()
  }

  /// The root for `alias`, created on first use. Shared roots are cloned
  /// before being handed out.
  pub(crate) fn root_mut(&mut self, alias: &str) -> &mut RootCommand {
    let root = self
      .roots
      .entry(alias.to_lowercase())
      .or_insert_with(|| Arc::new(RootCommand::new(alias.to_lowercase())));
    Arc::make_mut(root)
  }

  /// Drops every signature of `group`, evicting roots left empty.
  pub(crate) fn remove_group(&mut self, group: GroupId) -> bool {
    let mut removed = false;
    for root in self.roots.values_mut() {
      let touches = root
        .all_commands()
        .iter()
        .any(|command| command.group() == group);
      if touches {
        removed |= Arc::make_mut(root).remove_group(group);
      }
    }
    self.roots.retain(|_, root| !root.is_empty());
    removed
  }

  /// Rebinds every signature whose resolvers changed in `contexts`. A
  /// signature reachable under several aliases or paths stays one shared
  /// value. Returns how many signatures were rebound.
  pub(crate) fn rebind(&mut self, contexts: &CommandContexts) -> usize {
    let mut seen = HashSet::new();
    let mut rebound = HashMap::new();
    for root in self.roots.values() {
      for command in root.subcommands.values().flatten().chain(&root.catch_unknown) {
        if !seen.insert(Arc::as_ptr(command)) {
          continue;
        }
        if let Some(fresh) = command.rebind(contexts) {
          rebound.insert(Arc::as_ptr(command), Arc::new(fresh));
        }
      }
    }
    if rebound.is_empty() {
      return 0;
    }

    for root in self.roots.values_mut() {
      let touches = root
        .all_commands()
        .iter()
        .any(|command| rebound.contains_key(&Arc::as_ptr(command)));
      if touches {
        Arc::make_mut(root).replace_commands(&rebound);
      }
    }
    rebound.len()
  }
}
