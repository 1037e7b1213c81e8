use std::any::Any;

use regex::Regex;

use crate::{
  conditions::{
    ConditionSpec,
    parse_conditions,
  },
  contexts::{
    CommandContexts,
    ContextResolver,
    ResolverKind,
  },
  error::RegistrationError,
  flags::Flags,
  replacements::CommandReplacements,
  types::ParamType,
};

/// Declaration of one handler parameter.
///
/// ```ignore
/// Parameter::of::<String>("reason").default_value("Unknown User")
/// Parameter::of::<Vec<String>>("targets").split(",")
/// Parameter::of::<i32>("amount").flags("min=1,max=64").conditions("limits:max=3")
/// ```
#[derive(Debug, Clone)]
pub struct Parameter {
  pub(crate) name:        String,
  pub(crate) ty:          ParamType,
  pub(crate) optional:    bool,
  pub(crate) default:     Option<String>,
  pub(crate) rest:        bool,
  pub(crate) single:      bool,
  pub(crate) split:       Option<String>,
  pub(crate) flags:       String,
  pub(crate) values:      Option<String>,
  pub(crate) conditions:  Option<String>,
  pub(crate) permission:  Option<String>,
  pub(crate) description: Option<String>,
  pub(crate) syntax:      Option<String>,
}

impl Parameter {
  pub fn of<T: Any>(name: impl Into<String>) -> Self {
    Self::with_type(name, ParamType::of::<T>())
  }

  pub fn with_type(name: impl Into<String>, ty: ParamType) -> Self {
    Self {
      name: name.into(),
      ty,
      optional: false,
      default: None,
      rest: false,
      single: false,
      split: None,
      flags: String::new(),
      values: None,
      conditions: None,
      permission: None,
      description: None,
      syntax: None,
    }
  }

  /// Resolves to no value when the input runs out.
  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  /// Input used when the issuer supplies none. Implies [`Parameter::optional`].
  pub fn default_value(mut self, value: impl Into<String>) -> Self {
    self.default = Some(value.into());
    self.optional = true;
    self
  }

  /// Hands every remaining token to this parameter. Only valid on the last
  /// parameter.
  pub fn rest(mut self) -> Self {
    self.rest = true;
    self
  }

  /// Keeps a trailing text parameter from joining the remaining tokens.
  pub fn single(mut self) -> Self {
    self.single = true;
    self
  }

  /// Splits the remaining input on a regex. Only valid on the last parameter.
  pub fn split(mut self, pattern: impl Into<String>) -> Self {
    self.split = Some(pattern.into());
    self
  }

  pub fn flags(mut self, flags: impl Into<String>) -> Self {
    self.flags = flags.into();
    self
  }

  /// Pipe separated list of accepted inputs. Entries starting with `@` name a
  /// completion whose values are accepted too.
  pub fn values(mut self, values: impl Into<String>) -> Self {
    self.values = Some(values.into());
    self
  }

  pub fn conditions(mut self, conditions: impl Into<String>) -> Self {
    self.conditions = Some(conditions.into());
    self
  }

  /// Comma separated permissions required to supply this parameter.
  pub fn permission(mut self, permission: impl Into<String>) -> Self {
    self.permission = Some(permission.into());
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// Overrides the generated `<name>` / `[name]` usage text.
  pub fn syntax(mut self, syntax: impl Into<String>) -> Self {
    self.syntax = Some(syntax.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn ty(&self) -> ParamType {
    self.ty
  }
}

/// A parameter as it is used at dispatch: templates applied, flags merged
/// and the resolver looked up.
#[derive(Debug, Clone)]
pub struct BoundParameter {
  pub(crate) name:        String,
  pub(crate) ty:          ParamType,
  pub(crate) optional:    bool,
  pub(crate) default:     Option<String>,
  pub(crate) rest:        bool,
  pub(crate) single:      bool,
  pub(crate) split:       Option<Regex>,
  pub(crate) flags:       Flags,
  pub(crate) values:      Option<Vec<String>>,
  pub(crate) conditions:  Vec<ConditionSpec>,
  pub(crate) permissions: Vec<String>,
  pub(crate) description: Option<String>,
  pub(crate) syntax:      Option<String>,
  pub(crate) resolver:    Option<ContextResolver>,
}

impl BoundParameter {
  /// Binds `param`, inheriting `context_flags` declared for its type or any
  /// supertype. Entries earlier in `context_flags` take precedence.
  pub(crate) fn bind(
    param: Parameter,
    replacements: &CommandReplacements,
    contexts: &CommandContexts,
    context_flags: &[(ParamType, Flags)],
  ) -> Result<Self, RegistrationError> {
    let replace = |text: &str| replacements.replace(text);

    let mut flags = Flags::parse(&replace(&param.flags));
    for ty in contexts.hierarchy().chain(param.ty) {
      for (flag_ty, inherited) in context_flags {
        if *flag_ty == ty {
          flags.inherit(inherited);
        }
      }
    }

    let split = match &param.split {
      Some(pattern) => {
        let pattern = replace(pattern);
        Some(
          Regex::new(&pattern).map_err(|source| RegistrationError::InvalidSplitPattern {
            parameter: param.name.clone(),
            source,
          })?,
        )
      },
      None => None,
    };

    let resolver = contexts.get(param.ty).cloned();
    if resolver.is_none() {
      tracing::warn!(
        parameter = %param.name,
        ty = param.ty.name(),
        "no context resolver registered yet, resolving at dispatch"
      );
    }

    Ok(Self {
      split,
      flags,
      values: param.values.as_deref().map(|values| {
        replace(values)
          .split('|')
          .map(|value| value.trim().to_string())
          .filter(|value| !value.is_empty())
          .collect()
      }),
      conditions: param
        .conditions
        .as_deref()
        .map(|conditions| parse_conditions(&replace(conditions)))
        .unwrap_or_default(),
      permissions: param
        .permission
        .as_deref()
        .map(|permission| split_permissions(&replace(permission)))
        .unwrap_or_default(),
      default: param.default.as_deref().map(replace),
      resolver,
      name: param.name,
      ty: param.ty,
      optional: param.optional,
      rest: param.rest,
      single: param.single,
      description: param.description,
      syntax: param.syntax,
    })
  }

  /// Binds `param` against the built in resolvers only.
  pub(crate) fn unbound(param: Parameter) -> Result<Self, RegistrationError> {
    Self::bind(
      param,
      &CommandReplacements::new(),
      &CommandContexts::new(),
      &[],
    )
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn ty(&self) -> ParamType {
    self.ty
  }

  pub fn is_optional(&self) -> bool {
    self.optional
  }

  pub fn default_value(&self) -> Option<&str> {
    self.default.as_deref()
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn flags(&self) -> &Flags {
    &self.flags
  }

  pub fn kind(&self) -> ResolverKind {
    self
      .resolver
      .as_ref()
      .map_or(ResolverKind::Input, ContextResolver::kind)
  }

  pub fn consumes_input(&self) -> bool {
    self.kind().consumes_input()
  }

  /// Whether the issuer must supply a token for this parameter.
  pub fn requires_input(&self) -> bool {
    self.consumes_input() && !self.optional && !self.kind().accepts_missing_input()
  }

  /// Whether this parameter takes every remaining token when in position
  /// `is_last`.
  pub fn consumes_rest(&self, is_last: bool) -> bool {
    if self.rest || self.split.is_some() {
      return true;
    }
    is_last
      && !self.single
      && (self.ty.is::<String>() || self.ty.is::<Vec<String>>())
  }

  /// Whether this parameter must be last in its signature.
  pub(crate) fn must_be_last(&self) -> bool {
    self.rest || self.split.is_some()
  }

  /// Usage text, or `None` for parameters the issuer never types.
  pub fn syntax_text(&self) -> Option<String> {
    if !self.consumes_input() {
      return None;
    }
    if let Some(syntax) = &self.syntax {
      return Some(syntax.clone());
    }
    Some(if self.requires_input() {
      format!("<{}>", self.name)
    } else {
      format!("[{}]", self.name)
    })
  }
}

pub(crate) fn split_permissions(permission: &str) -> Vec<String> {
  permission
    .split(',')
    .map(str::trim)
    .filter(|permission| !permission.is_empty())
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod test {
  use super::*;

  struct Player;

  #[test]
  fn bind_applies_replacements() {
    let mut replacements = CommandReplacements::new();
    replacements.add("admin", "plugin.admin");
    let param = Parameter::of::<bool>("confirm")
      .values("%truthy")
      .permission("%admin.confirm, other")
      .default_value("yes");
    let bound = BoundParameter::bind(param, &replacements, &CommandContexts::new(), &[]).unwrap();

    assert_eq!(bound.values.as_ref().unwrap().len(), 8);
    assert_eq!(bound.permissions, vec!["plugin.admin.confirm", "other"]);
    assert_eq!(bound.default_value(), Some("yes"));
    assert!(bound.is_optional());
    assert_eq!(bound.syntax_text().as_deref(), Some("[confirm]"));
  }

  #[test]
  fn context_flags_are_inherited() {
    let param = Parameter::of::<i32>("amount").flags("max=10");
    let context_flags = vec![(ParamType::of::<i32>(), Flags::parse("min=1,max=99"))];
    let bound =
      BoundParameter::bind(param, &CommandReplacements::new(), &CommandContexts::new(), &context_flags)
        .unwrap();
    assert_eq!(bound.flags.get("min"), Some("1"));
    assert_eq!(bound.flags.get("max"), Some("10"));
  }

  #[test]
  fn consumes_rest() {
    let text = BoundParameter::unbound(Parameter::of::<String>("text")).unwrap();
    assert!(text.consumes_rest(true));
    assert!(!text.consumes_rest(false));

    let single = BoundParameter::unbound(Parameter::of::<String>("text").single()).unwrap();
    assert!(!single.consumes_rest(true));

    let split = BoundParameter::unbound(Parameter::of::<Vec<String>>("list").split(",")).unwrap();
    assert!(split.consumes_rest(false));
    assert!(split.must_be_last());
  }

  #[test]
  fn unresolved_types_are_required_input() {
    let bound = BoundParameter::unbound(Parameter::of::<Player>("target")).unwrap();
    assert!(bound.resolver.is_none());
    assert!(bound.requires_input());
    assert_eq!(bound.syntax_text().as_deref(), Some("<target>"));
  }

  #[test]
  fn invalid_split_pattern() {
    let err = BoundParameter::unbound(Parameter::of::<Vec<String>>("list").split("(")).unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidSplitPattern { .. }));
  }
}
