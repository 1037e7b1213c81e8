//! Context resolvers: turning input tokens or issuer state into typed values.
//!
//! Every parameter type needs a [`ContextResolver`]. Lookups walk the
//! declared [`TypeHierarchy`], so a resolver registered for a supertype serves
//! subtypes that lack their own registration.

use std::{
  any::Any,
  collections::HashMap,
  fmt,
  sync::Arc,
};

use crate::{
  error::InvalidArgument,
  execution::ExecutionContext,
  messages::{
    Message,
    MessageKey,
  },
  types::{
    ParamType,
    TypeHierarchy,
    Value,
  },
};

/// How a resolver relates to the input tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
  /// Consumes input and needs it to be present.
  Input,
  /// Consumes input when present, but may produce a value without any.
  Optional,
  /// Like [`ResolverKind::Optional`], falling back to the issuer.
  IssuerAware,
  /// Never consumes input; the value comes from the issuer or session.
  IssuerOnly,
}

impl ResolverKind {
  pub fn consumes_input(self) -> bool {
    self != ResolverKind::IssuerOnly
  }

  /// Whether the resolver may be called with no tokens left.
  pub fn accepts_missing_input(self) -> bool {
    matches!(self, ResolverKind::Optional | ResolverKind::IssuerAware)
  }
}

pub type ResolveFn =
  Arc<dyn Fn(&mut ExecutionContext<'_>) -> Result<Option<Value>, InvalidArgument> + Send + Sync>;

#[derive(Clone)]
pub struct ContextResolver {
  kind:    ResolverKind,
  resolve: ResolveFn,
}

impl fmt::Debug for ContextResolver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContextResolver")
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

impl ContextResolver {
  pub fn new(kind: ResolverKind, resolve: ResolveFn) -> Self {
    Self { kind, resolve }
  }

  /// Whether both are the same registration.
  pub(crate) fn same_as(&self, other: &ContextResolver) -> bool {
    self.kind == other.kind && Arc::ptr_eq(&self.resolve, &other.resolve)
  }

  fn typed<T, F>(kind: ResolverKind, resolve: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<T, InvalidArgument> + Send + Sync + 'static,
  {
    Self::new(
      kind,
      Arc::new(move |ctx: &mut ExecutionContext<'_>| {
        resolve(ctx).map(|value| Some(Arc::new(value) as Value))
      }),
    )
  }

  pub fn input<T, F>(resolve: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<T, InvalidArgument> + Send + Sync + 'static,
  {
    Self::typed(ResolverKind::Input, resolve)
  }

  pub fn issuer_only<T, F>(resolve: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<T, InvalidArgument> + Send + Sync + 'static,
  {
    Self::typed(ResolverKind::IssuerOnly, resolve)
  }

  pub fn issuer_aware<T, F>(resolve: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<T, InvalidArgument> + Send + Sync + 'static,
  {
    Self::typed(ResolverKind::IssuerAware, resolve)
  }

  pub fn optional<T, F>(resolve: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&mut ExecutionContext<'_>) -> Result<Option<T>, InvalidArgument> + Send + Sync + 'static,
  {
    Self::new(
      ResolverKind::Optional,
      Arc::new(move |ctx: &mut ExecutionContext<'_>| {
        resolve(ctx).map(|value| value.map(|value| Arc::new(value) as Value))
      }),
    )
  }

  pub fn kind(&self) -> ResolverKind {
    self.kind
  }

  pub fn resolve(&self, ctx: &mut ExecutionContext<'_>) -> Result<Option<Value>, InvalidArgument> {
    (self.resolve)(ctx)
  }
}

/// Enums usable as command parameters.
///
/// Input is matched against [`CommandEnum::name`] ignoring case and any
/// character that is not alphanumeric, so `dark_red`, `DarkRed` and
/// `dark-red` all select the same variant.
pub trait CommandEnum: Sized + Clone + Send + Sync + 'static {
  fn variants() -> &'static [Self];

  fn name(&self) -> &'static str;
}

pub(crate) fn enum_names<E: CommandEnum>() -> Vec<String> {
  E::variants()
    .iter()
    .map(|variant| variant.name().to_string())
    .collect()
}

fn simplify(name: &str) -> String {
  name
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_lowercase())
    .collect()
}

/// Registry of context resolvers keyed by parameter type.
#[derive(Debug, Clone)]
pub struct CommandContexts {
  resolvers: HashMap<ParamType, ContextResolver>,
  hierarchy: TypeHierarchy,
}

impl Default for CommandContexts {
  fn default() -> Self {
    let mut contexts = Self {
      resolvers: HashMap::new(),
      hierarchy: TypeHierarchy::new(),
    };
    contexts.register_builtins();
    contexts
  }
}

impl CommandContexts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, ty: ParamType, resolver: ContextResolver) -> Option<ContextResolver> {
    self.resolvers.insert(ty, resolver)
  }

  /// Finds the resolver for `ty`, falling back to its supertypes.
  pub fn get(&self, ty: ParamType) -> Option<&ContextResolver> {
    self
      .hierarchy
      .chain(ty)
      .find_map(|ty| self.resolvers.get(&ty))
  }

  pub fn hierarchy(&self) -> &TypeHierarchy {
    &self.hierarchy
  }

  pub fn hierarchy_mut(&mut self) -> &mut TypeHierarchy {
    &mut self.hierarchy
  }

  pub fn register_enum<E: CommandEnum>(&mut self) {
    self.register(
      ParamType::of::<E>(),
      ContextResolver::input(|ctx| {
        let token = ctx.pop_first_arg().unwrap_or_default();
        let wanted = simplify(&token);
        E::variants()
          .iter()
          .find(|variant| simplify(variant.name()) == wanted)
          .cloned()
          .ok_or_else(|| {
            InvalidArgument::key(
              Message::key(MessageKey::PleaseSpecifyOneOf).with("valid", enum_names::<E>().join(", ")),
            )
          })
      }),
    );
  }

  fn register_builtins(&mut self) {
    self.register(
      ParamType::of::<i32>(),
      ContextResolver::input(|ctx| {
        let value = resolve_integer(ctx, i32::MIN as i64, i32::MAX as i64)?;
        i32::try_from(value).map_err(|_| not_a_number(&value.to_string()))
      }),
    );
    self.register(
      ParamType::of::<i64>(),
      ContextResolver::input(|ctx| resolve_integer(ctx, i64::MIN, i64::MAX)),
    );
    self.register(
      ParamType::of::<u32>(),
      ContextResolver::input(|ctx| {
        let value = resolve_integer(ctx, 0, u32::MAX as i64)?;
        u32::try_from(value).map_err(|_| not_a_number(&value.to_string()))
      }),
    );
    self.register(
      ParamType::of::<f64>(),
      ContextResolver::input(|ctx| resolve_float(ctx, f64::MIN, f64::MAX)),
    );
    self.register(
      ParamType::of::<f32>(),
      ContextResolver::input(|ctx| {
        resolve_float(ctx, f32::MIN as f64, f32::MAX as f64).map(|value| value as f32)
      }),
    );
    self.register(
      ParamType::of::<bool>(),
      ContextResolver::input(|ctx| Ok(is_truthy(&ctx.pop_first_arg().unwrap_or_default()))),
    );
    self.register(ParamType::of::<String>(), ContextResolver::input(resolve_string));
    self.register(
      ParamType::of::<Vec<String>>(),
      ContextResolver::input(resolve_string_list),
    );
  }
}

fn not_a_number(token: &str) -> InvalidArgument {
  InvalidArgument::key(Message::key(MessageKey::MustBeANumber).with("num", token))
}

/// Whether `value` reads as an affirmative answer.
pub fn is_truthy(value: &str) -> bool {
  matches!(
    value.to_ascii_lowercase().as_str(),
    "t" | "true" | "on" | "y" | "yes" | "1"
  )
}

/// Parses numeric input: decimal, `0x` hexadecimal, `0b` binary, and with
/// `suffixes` a trailing `k` or `m` multiplier.
pub fn parse_number(token: &str, suffixes: bool) -> Option<f64> {
  if let Some(hex) = token.strip_prefix("0x") {
    return i64::from_str_radix(hex, 16).ok().map(|value| value as f64);
  }
  if let Some(binary) = token.strip_prefix("0b") {
    return i64::from_str_radix(binary, 2).ok().map(|value| value as f64);
  }

  let (digits, modifier) = match token.chars().last().map(|c| c.to_ascii_lowercase()) {
    Some('k') if suffixes => (&token[..token.len() - 1], 1_000.0),
    Some('m') if suffixes => (&token[..token.len() - 1], 1_000_000.0),
    _ => (token, 1.0),
  };

  let value: f64 = digits.parse().ok()?;
  value.is_finite().then_some(value * modifier)
}

fn check_range(ctx: &ExecutionContext<'_>, value: f64, min: f64, max: f64) -> Result<(), InvalidArgument> {
  let min = ctx
    .flags()
    .get_parsed::<f64>("min")
    .map_or(min, |flag| flag.max(min));
  let max = ctx
    .flags()
    .get_parsed::<f64>("max")
    .map_or(max, |flag| flag.min(max));

  if value < min {
    return Err(InvalidArgument::key(
      Message::key(MessageKey::PleaseSpecifyAtLeast).with("min", format_bound(min)),
    ));
  }
  if value > max {
    return Err(InvalidArgument::key(
      Message::key(MessageKey::PleaseSpecifyAtMost).with("max", format_bound(max)),
    ));
  }
  Ok(())
}

fn format_bound(bound: f64) -> String {
  if bound.fract() == 0.0 && bound.abs() < 1e15 {
    format!("{}", bound as i64)
  } else {
    bound.to_string()
  }
}

fn resolve_integer(ctx: &mut ExecutionContext<'_>, min: i64, max: i64) -> Result<i64, InvalidArgument> {
  let token = ctx.pop_first_arg().unwrap_or_default();

  if let Ok(value) = token.parse::<i64>() {
    check_range(ctx, value as f64, min as f64, max as f64)?;
    return Ok(value);
  }

  let value = parse_number(&token, ctx.has_flag("suffixes"))
    .ok_or_else(|| not_a_number(&token))?
    .trunc();
  check_range(ctx, value, min as f64, max as f64)?;
  Ok(value as i64)
}

fn resolve_float(ctx: &mut ExecutionContext<'_>, min: f64, max: f64) -> Result<f64, InvalidArgument> {
  let token = ctx.pop_first_arg().unwrap_or_default();
  let value = parse_number(&token, ctx.has_flag("suffixes")).ok_or_else(|| not_a_number(&token))?;
  check_range(ctx, value, min, max)?;
  Ok(value)
}

fn resolve_string(ctx: &mut ExecutionContext<'_>) -> Result<String, InvalidArgument> {
  let value = if ctx.consumes_rest() {
    ctx.join_remaining(" ")
  } else {
    ctx.pop_first_arg().unwrap_or_default()
  };

  let length = value.chars().count();
  if let Some(min) = ctx.flags().get_parsed::<usize>("minlen") {
    if length < min {
      return Err(InvalidArgument::key(
        Message::key(MessageKey::MustBeMinLength).with("min", min.to_string()),
      ));
    }
  }
  if let Some(max) = ctx.flags().get_parsed::<usize>("maxlen") {
    if length > max {
      return Err(InvalidArgument::key(
        Message::key(MessageKey::MustBeMaxLength).with("max", max.to_string()),
      ));
    }
  }

  Ok(value)
}

fn resolve_string_list(ctx: &mut ExecutionContext<'_>) -> Result<Vec<String>, InvalidArgument> {
  let Some(pattern) = ctx.split_pattern().cloned() else {
    return Ok(ctx.take_remaining());
  };

  let value = if ctx.consumes_rest() {
    ctx.join_remaining(" ")
  } else {
    ctx.pop_first_arg().unwrap_or_default()
  };
  if value.trim().is_empty() {
    return Err(InvalidArgument::syntax());
  }

  Ok(pattern.split(&value).map(str::to_string).collect())
}
