use std::{
  any::{
    Any,
    TypeId,
  },
  collections::{
    HashMap,
    VecDeque,
  },
  fmt,
};

use indexmap::IndexMap;
use regex::Regex;

use crate::{
  flags::Flags,
  issuer::CommandIssuer,
  param::BoundParameter,
  types::{
    ParamType,
    Value,
    value_type_id,
  },
};

/// Values resolved so far, by declared parameter name and by runtime type.
///
/// Optional parameters that received no value are present by name with no
/// value.
#[derive(Clone, Default)]
pub struct ResolvedArgs {
  by_name: IndexMap<String, Option<Value>>,
  by_type: HashMap<TypeId, Value>,
}

impl ResolvedArgs {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn insert(&mut self, name: &str, value: Option<Value>) {
    if let Some(value) = &value {
      self.by_type.insert(value_type_id(value), value.clone());
    }
    self.by_name.insert(name.to_string(), value);
  }

  /// The value of parameter `name` if it was resolved to a `T`.
  pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
    self
      .by_name
      .get(name)?
      .as_ref()?
      .downcast_ref::<T>()
  }

  pub fn get_cloned<T: Any + Clone>(&self, name: &str) -> Option<T> {
    self.get::<T>(name).cloned()
  }

  /// The most recently resolved value of type `T`.
  pub fn by_type<T: Any>(&self) -> Option<&T> {
    self.by_type.get(&TypeId::of::<T>())?.downcast_ref::<T>()
  }

  pub fn value(&self, name: &str) -> Option<&Value> {
    self.by_name.get(name)?.as_ref()
  }

  /// Whether `name` was processed, with or without a value.
  pub fn contains(&self, name: &str) -> bool {
    self.by_name.contains_key(name)
  }

  /// Whether `name` resolved to an actual value.
  pub fn is_present(&self, name: &str) -> bool {
    self.value(name).is_some()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.by_name.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.by_name.len()
  }

  pub fn is_empty(&self) -> bool {
    self.by_name.is_empty()
  }
}

impl fmt::Debug for ResolvedArgs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map()
      .entries(
        self
          .by_name
          .iter()
          .map(|(name, value)| (name, value.is_some())),
      )
      .finish()
  }
}

/// Cursor handed to a context resolver while one parameter is resolved.
pub struct ExecutionContext<'a> {
  issuer:   &'a dyn CommandIssuer,
  command:  &'a str,
  param:    &'a BoundParameter,
  index:    usize,
  is_last:  bool,
  args:     &'a mut VecDeque<String>,
  resolved: &'a ResolvedArgs,
}

impl<'a> ExecutionContext<'a> {
  pub(crate) fn new(
    issuer: &'a dyn CommandIssuer,
    command: &'a str,
    param: &'a BoundParameter,
    index: usize,
    is_last: bool,
    args: &'a mut VecDeque<String>,
    resolved: &'a ResolvedArgs,
  ) -> Self {
    Self {
      issuer,
      command,
      param,
      index,
      is_last,
      args,
      resolved,
    }
  }

  pub fn issuer(&self) -> &dyn CommandIssuer {
    self.issuer
  }

  /// The issuer as its concrete host type.
  pub fn issuer_as<T: Any>(&self) -> Option<&T> {
    self.issuer.as_any().downcast_ref::<T>()
  }

  /// Root alias and path of the command being resolved.
  pub fn command(&self) -> &str {
    self.command
  }

  pub fn param_name(&self) -> &str {
    &self.param.name
  }

  pub fn param_type(&self) -> ParamType {
    self.param.ty
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn is_last_arg(&self) -> bool {
    self.is_last
  }

  pub fn is_optional(&self) -> bool {
    self.param.optional
  }

  /// Whether this parameter takes every remaining token.
  pub fn consumes_rest(&self) -> bool {
    self.param.consumes_rest(self.is_last)
  }

  pub fn split_pattern(&self) -> Option<&Regex> {
    self.param.split.as_ref()
  }

  pub fn flags(&self) -> &Flags {
    &self.param.flags
  }

  pub fn has_flag(&self, key: &str) -> bool {
    self.param.flags.has(key)
  }

  pub fn flag_value(&self, key: &str) -> Option<&str> {
    self.param.flags.get(key)
  }

  pub fn args(&self) -> &VecDeque<String> {
    &*self.args
  }

  pub fn first_arg(&self) -> Option<&str> {
    self.args.front().map(String::as_str)
  }

  pub fn last_arg(&self) -> Option<&str> {
    self.args.back().map(String::as_str)
  }

  pub fn pop_first_arg(&mut self) -> Option<String> {
    self.args.pop_front()
  }

  pub fn pop_last_arg(&mut self) -> Option<String> {
    self.args.pop_back()
  }

  /// Removes and returns every remaining token.
  pub fn take_remaining(&mut self) -> Vec<String> {
    self.args.drain(..).collect()
  }

  /// Removes every remaining token and joins them with `separator`.
  pub fn join_remaining(&mut self, separator: &str) -> String {
    self.take_remaining().join(separator)
  }

  pub fn resolved(&self) -> &ResolvedArgs {
    self.resolved
  }

  pub fn resolved_value<T: Any>(&self, name: &str) -> Option<&T> {
    self.resolved.get::<T>(name)
  }
}

/// What a command handler receives once every parameter is resolved.
pub struct Invocation<'a> {
  pub issuer:  &'a dyn CommandIssuer,
  /// The alias the issuer typed.
  pub label:   &'a str,
  /// Root alias and path of the invoked signature.
  pub command: &'a str,
  pub args:    &'a ResolvedArgs,
}

impl<'a> Invocation<'a> {
  pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
    self.args.get::<T>(name)
  }

  pub fn issuer_as<T: Any>(&self) -> Option<&T> {
    self.issuer.as_any().downcast_ref::<T>()
  }
}
