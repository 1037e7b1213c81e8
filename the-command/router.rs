//! Sub-command path matching and overload selection.
//!
//! Routing is a static filter over declared arities. Once a signature is
//! selected, a failure while resolving it is final; no other overload is
//! tried.

use std::sync::Arc;

use crate::{
  command::RegisteredCommand,
  issuer::CommandIssuer,
  tree::RootCommand,
};

/// The signatures a line was routed to and the tokens left for them.
#[derive(Debug, Clone)]
pub struct Route {
  /// Matched sub-command path, empty for default and catch-unknown routes.
  pub path:       String,
  pub args:       Vec<String>,
  pub candidates: Vec<Arc<RegisteredCommand>>,
}

/// Finds the signatures for `args` under `root`.
///
/// The longest space joined prefix of `args` that names a sub-command path
/// wins. Without one, the default signatures that can take every token are
/// used, then the catch-unknown signatures, then the default signatures
/// regardless of arity so their usage can be shown.
pub fn route(root: &RootCommand, args: &[String]) -> Option<Route> {
  for len in (1..=args.len()).rev() {
    let path = args[..len].join(" ").to_lowercase();
    let candidates = root.commands(&path);
    if !candidates.is_empty() {
      tracing::debug!(root = root.name(), %path, "matched sub-command");
      return Some(Route {
        path,
        args: args[len..].to_vec(),
        candidates: candidates.to_vec(),
      });
    }
  }

  let count = args.len();
  let defaults = root.default_commands();
  let fitting: Vec<_> = defaults
    .iter()
    .filter(|command| accepts_count(command, count))
    .cloned()
    .collect();

  let candidates = if !fitting.is_empty() {
    fitting
  } else if !root.catch_unknown().is_empty() {
    root.catch_unknown().to_vec()
  } else if !defaults.is_empty() {
    defaults.to_vec()
  } else {
    return None;
  };

  Some(Route {
    path: String::new(),
    args: args.to_vec(),
    candidates,
  })
}

fn accepts_count(command: &RegisteredCommand, count: usize) -> bool {
  count <= command.required_count() + command.optional_count()
    || (command.consumes_rest() && count >= command.required_count())
}

/// Picks one of `candidates` for `count` remaining tokens.
///
/// A lone candidate is always selected. Otherwise candidates that could
/// take `count` tokens are ranked by how many optional or issuer supplied
/// parameters they would leave unfilled, then by declaration order.
/// `completing` admits signatures whose required parameters are not all
/// typed yet.
pub fn select(
  candidates: &[Arc<RegisteredCommand>],
  count: usize,
  completing: bool,
) -> Option<Arc<RegisteredCommand>> {
  if let [only] = candidates {
    return Some(only.clone());
  }

  candidates
    .iter()
    .filter(|command| {
      let capacity = command.required_count() + command.optional_count();
      let fits = count <= capacity || command.consumes_rest();
      fits && (completing || count >= command.required_count())
    })
    .min_by_key(|command| {
      let capacity = command.required_count() + command.optional_count();
      (capacity.saturating_sub(count) + command.sender_aware_count(), command.order)
    })
    .cloned()
}

/// Sub-command words that could complete the last of `args`.
pub fn subcommand_suggestions(
  root: &RootCommand,
  issuer: &dyn CommandIssuer,
  args: &[String],
) -> Vec<String> {
  let Some(index) = args.len().checked_sub(1) else {
    return Vec::new();
  };
  let typed = args.join(" ").to_lowercase();

  let mut suggestions: Vec<String> = Vec::new();
  for (path, commands) in root.entries() {
    if path.is_empty() || !path.starts_with(&typed) {
      continue;
    }
    let Some(word) = path.split(' ').nth(index) else {
      continue;
    };
    let visible = commands
      .iter()
      .any(|command| !command.is_private() && command.has_permission(issuer));
    if visible && !suggestions.iter().any(|seen| seen == word) {
      suggestions.push(word.to_string());
    }
  }
  suggestions
}
