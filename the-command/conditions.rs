//! Named pre-execution checks.
//!
//! Command conditions run after the permission check and before any
//! parameter is resolved. Parameter conditions are keyed by type and id and
//! run right after the value they inspect has been resolved. Conditions are
//! declared as a pipe separated list where each entry is an id optionally
//! followed by `:` or `=` and a flag list, e.g. `ingame|limits:min=1,max=3`.

use std::{
  any::Any,
  collections::HashMap,
  sync::Arc,
};

use crate::{
  error::ConditionFailed,
  execution::ResolvedArgs,
  flags::Flags,
  issuer::CommandIssuer,
  types::{
    ParamType,
    TypeHierarchy,
    Value,
  },
};

/// One `id[:config]` entry of a condition list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSpec {
  pub id:     String,
  pub config: Flags,
}

pub fn parse_conditions(input: &str) -> Vec<ConditionSpec> {
  input
    .split('|')
    .map(str::trim)
    .filter(|entry| !entry.is_empty())
    .map(|entry| {
      let (id, config) = entry.split_once([':', '=']).unwrap_or((entry, ""));
      ConditionSpec {
        id:     id.trim().to_lowercase(),
        config: Flags::parse(config),
      }
    })
    .collect()
}

/// What a condition gets to look at.
pub struct ConditionContext<'a> {
  pub issuer:    &'a dyn CommandIssuer,
  pub id:        &'a str,
  pub config:    &'a Flags,
  /// Root alias and path of the command.
  pub command:   &'a str,
  /// Values resolved before the check ran.
  pub resolved:  &'a ResolvedArgs,
  /// The parameter under inspection, for parameter conditions.
  pub parameter: Option<&'a str>,
}

impl<'a> ConditionContext<'a> {
  pub fn has_config(&self, key: &str) -> bool {
    self.config.has(key)
  }

  pub fn config_value(&self, key: &str) -> Option<&str> {
    self.config.get(key)
  }

  pub fn config_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
    self.config.get_parsed(key)
  }

  pub fn issuer_as<T: Any>(&self) -> Option<&T> {
    self.issuer.as_any().downcast_ref::<T>()
  }
}

pub type ConditionFn = Arc<dyn Fn(&ConditionContext<'_>) -> Result<(), ConditionFailed> + Send + Sync>;

pub type ParameterConditionFn =
  Arc<dyn Fn(&ConditionContext<'_>, &Value) -> Result<(), ConditionFailed> + Send + Sync>;

#[derive(Clone, Default)]
pub struct CommandConditions {
  conditions: HashMap<String, ConditionFn>,
  parameters: HashMap<(ParamType, String), ParameterConditionFn>,
}

impl CommandConditions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, id: &str, condition: ConditionFn) -> Option<ConditionFn> {
    self.conditions.insert(id.to_lowercase(), condition)
  }

  pub fn add_parameter(
    &mut self,
    ty: ParamType,
    id: &str,
    condition: ParameterConditionFn,
  ) -> Option<ParameterConditionFn> {
    self.parameters.insert((ty, id.to_lowercase()), condition)
  }

  pub fn get(&self, id: &str) -> Option<ConditionFn> {
    self.conditions.get(id).cloned()
  }

  /// Finds the parameter condition `id` for `ty` or its nearest supertype.
  pub fn get_parameter(
    &self,
    hierarchy: &TypeHierarchy,
    ty: ParamType,
    id: &str,
  ) -> Option<ParameterConditionFn> {
    hierarchy
      .chain(ty)
      .find_map(|ty| self.parameters.get(&(ty, id.to_string())))
      .cloned()
  }
}
