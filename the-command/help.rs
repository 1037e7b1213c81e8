//! Per-issuer command listings.
//!
//! A [`CommandHelp`] snapshots the signatures of one root command that an
//! issuer may run, then narrows them with [`CommandHelp::search`] and pages
//! through them. Rendering goes through the message catalog, so every line
//! can be reworded like any other message.

use std::{
  cmp::Reverse,
  sync::Arc,
};

use crate::{
  command::RegisteredCommand,
  issuer::CommandIssuer,
  messages::{
    Message,
    MessageCatalog,
    MessageKey,
  },
  tree::RootCommand,
};

pub const DEFAULT_PER_PAGE: usize = 10;

/// One listed signature.
#[derive(Debug, Clone)]
pub struct HelpEntry {
  command:      Arc<RegisteredCommand>,
  search_score: usize,
}

impl HelpEntry {
  fn new(command: Arc<RegisteredCommand>) -> Self {
    Self {
      command,
      search_score: 1,
    }
  }

  /// Root alias and path, e.g. `"sc give"`.
  pub fn command(&self) -> &str {
    self.command.command()
  }

  pub fn parameter_syntax(&self) -> &str {
    self.command.syntax()
  }

  pub fn description(&self) -> &str {
    self.command.description().unwrap_or_default()
  }

  /// Names and descriptions of the parameters that have one.
  pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .command
      .params()
      .iter()
      .filter_map(|param| param.description().map(|description| (param.name(), description)))
  }

  pub fn registered(&self) -> &Arc<RegisteredCommand> {
    &self.command
  }

  pub fn search_score(&self) -> usize {
    self.search_score
  }

  pub fn should_show(&self) -> bool {
    self.search_score > 0
  }

  /// Three points per term found in the command, two in the description
  /// and one in the usage text or a parameter description.
  fn score(&self, terms: &[String]) -> usize {
    let command = self.command().to_lowercase();
    let description = self.description().to_lowercase();
    let syntax = self.parameter_syntax().to_lowercase();
    let parameters: Vec<_> = self
      .parameters()
      .map(|(_, description)| description.to_lowercase())
      .collect();

    terms
      .iter()
      .map(|term| {
        let term = term.as_str();
        let mut score = 0;
        if command.contains(term) {
          score += 3;
        }
        if description.contains(term) {
          score += 2;
        }
        if syntax.contains(term) || parameters.iter().any(|text| text.contains(term)) {
          score += 1;
        }
        score
      })
      .sum()
  }
}

/// The help listing of one root command for one issuer.
#[derive(Debug, Clone)]
pub struct CommandHelp {
  command:  String,
  entries:  Vec<HelpEntry>,
  search:   Option<Vec<String>>,
  page:     usize,
  per_page: usize,
}

impl CommandHelp {
  /// Every signature of `root` that `issuer` may run, private ones left out,
  /// in registration order.
  pub fn new(root: &RootCommand, issuer: &dyn CommandIssuer) -> Self {
    let mut help = Self {
      command:  root.name().to_string(),
      entries:  root
        .all_commands()
        .into_iter()
        .filter(|command| !command.is_private() && command.has_permission(issuer))
        .map(HelpEntry::new)
        .collect(),
      search:   None,
      page:     1,
      per_page: DEFAULT_PER_PAGE,
    };
    help.sort();
    help
  }

  /// The root alias the listing was built for.
  pub fn command(&self) -> &str {
    &self.command
  }

  /// Every entry, best search match first. Entries that did not match the
  /// last search are kept with a score of zero.
  pub fn entries(&self) -> &[HelpEntry] {
    &self.entries
  }

  /// Keeps only entries matching at least one of `terms`, best match first,
  /// and goes back to the first page. No terms clears the search.
  pub fn search<S: AsRef<str>>(&mut self, terms: &[S]) {
    let terms: Vec<String> = terms
      .iter()
      .map(|term| term.as_ref().trim().to_lowercase())
      .filter(|term| !term.is_empty())
      .collect();

    for entry in &mut self.entries {
      entry.search_score = if terms.is_empty() { 1 } else { entry.score(&terms) };
    }
    self.search = (!terms.is_empty()).then_some(terms);
    self.page = 1;
    self.sort();
  }

  pub fn search_terms(&self) -> Option<&[String]> {
    self.search.as_deref()
  }

  pub fn is_search(&self) -> bool {
    self.search.is_some()
  }

  pub fn page(&self) -> usize {
    self.page
  }

  /// Selects the 1-based page to render.
  pub fn set_page(&mut self, page: usize) {
    self.page = page.max(1);
  }

  pub fn per_page(&self) -> usize {
    self.per_page
  }

  pub fn set_per_page(&mut self, per_page: usize) {
    self.per_page = per_page.max(1);
  }

  /// Number of entries that match the current search.
  pub fn results(&self) -> usize {
    self.entries.iter().filter(|entry| entry.should_show()).count()
  }

  pub fn total_pages(&self) -> usize {
    self.results().div_ceil(self.per_page)
  }

  /// The matching entries on the current page.
  pub fn page_entries(&self) -> impl Iterator<Item = &HelpEntry> {
    self
      .entries
      .iter()
      .filter(|entry| entry.should_show())
      .skip((self.page - 1).saturating_mul(self.per_page))
      .take(self.per_page)
  }

  /// Formats the current page: a header, one line per entry and the page
  /// information when there is more than one page. Runs of spaces left by
  /// empty placeholders are collapsed.
  pub fn render(&self, catalog: &dyn MessageCatalog) -> Vec<String> {
    let entries: Vec<_> = self.page_entries().collect();
    if entries.is_empty() {
      return vec![Message::key(MessageKey::HelpNoResults).render(catalog)];
    }

    let header = match &self.search {
      Some(terms) => {
        Message::key(MessageKey::HelpSearchHeader)
          .with("command", self.command.as_str())
          .with("search", terms.join(" "))
      },
      None => Message::key(MessageKey::HelpHeader).with("command", self.command.as_str()),
    };
    let mut lines = vec![header.render(catalog)];

    for entry in entries {
      let separator = if entry.description().is_empty() { "" } else { "-" };
      let formatted = Message::key(MessageKey::HelpFormat)
        .with("command", entry.command())
        .with("parameters", entry.parameter_syntax())
        .with("separator", separator)
        .with("description", entry.description())
        .render(catalog);
      lines.extend(formatted.lines().map(collapse_spaces));
    }

    if self.total_pages() > 1 {
      let info = Message::key(MessageKey::HelpPageInformation)
        .with("page", self.page.to_string())
        .with("totalpages", self.total_pages().to_string())
        .with("results", self.results().to_string());
      lines.push(info.render(catalog));
    }
    lines
  }

  fn sort(&mut self) {
    self
      .entries
      .sort_by_key(|entry| (Reverse(entry.search_score), entry.command.order));
  }
}

fn collapse_spaces(line: &str) -> String {
  line
    .split(' ')
    .filter(|word| !word.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}
