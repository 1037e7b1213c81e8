use std::{
  any::{
    Any,
    TypeId,
  },
  collections::{
    HashMap,
    HashSet,
  },
  fmt,
  hash::{
    Hash,
    Hasher,
  },
  sync::Arc,
};

/// A resolved parameter value.
pub type Value = Arc<dyn Any + Send + Sync>;

/// The declared type of a command parameter.
#[derive(Clone, Copy)]
pub struct ParamType {
  id:   TypeId,
  name: &'static str,
}

impl ParamType {
  pub fn of<T: Any>() -> Self {
    Self {
      id:   TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }

  pub fn id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// The type name without its module path, used in generated syntax.
  pub fn short_name(&self) -> &'static str {
    let base = self.name.split('<').next().unwrap_or(self.name);
    base.rsplit("::").next().unwrap_or(base)
  }

  pub fn is<T: Any>(&self) -> bool {
    self.id == TypeId::of::<T>()
  }
}

impl PartialEq for ParamType {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for ParamType {}

impl Hash for ParamType {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for ParamType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

impl fmt::Display for ParamType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// Runtime type id of the value behind a [`Value`].
pub fn value_type_id(value: &Value) -> TypeId {
  Any::type_id(&**value)
}

/// Declared supertype relations between parameter types.
///
/// Rust has no class inheritance, so resolver, condition and completion
/// lookups that should fall back to a broader type consult this table. Each
/// type has at most one direct supertype.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
  parents: HashMap<ParamType, ParamType>,
}

impl TypeHierarchy {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declares `parent` as the direct supertype of `child`.
  ///
  /// Returns false and leaves the table untouched if the declaration would
  /// introduce a cycle.
  pub fn declare(&mut self, child: ParamType, parent: ParamType) -> bool {
    if child == parent || self.chain(parent).any(|ty| ty == child) {
      return false;
    }
    self.parents.insert(child, parent);
    true
  }

  pub fn parent(&self, ty: ParamType) -> Option<ParamType> {
    self.parents.get(&ty).copied()
  }

  /// Iterates over `ty` followed by each of its supertypes, nearest first.
  pub fn chain(&self, ty: ParamType) -> impl Iterator<Item = ParamType> + '_ {
    let mut seen = HashSet::new();
    std::iter::successors(Some(ty), move |current| self.parents.get(current).copied())
      .take_while(move |ty| seen.insert(*ty))
  }

  /// Whether a value of type `from` can stand in for a parameter of type `to`.
  pub fn is_assignable(&self, from: ParamType, to: ParamType) -> bool {
    self.chain(from).any(|ty| ty == to)
  }

  /// Whether either type is assignable to the other.
  pub fn is_related(&self, a: ParamType, b: ParamType) -> bool {
    self.is_assignable(a, b) || self.is_assignable(b, a)
  }
}
