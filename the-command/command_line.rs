//! Splitting raw input lines into command tokens.
//!
//! Tokens are separated by a single space. Consecutive spaces produce empty
//! tokens rather than being collapsed, so joining the tokens back with `" "`
//! reproduces the original text exactly. Parameters that consume the rest of
//! the line rely on this.

/// Splits a command line into the alias and arguments parts.
///
/// The third tuple member describes whether the alias part is finished. When
/// this boolean is true the completion code should complete aliases,
/// otherwise command arguments.
pub fn split(line: &str) -> (&str, &str, bool) {
  let (alias, rest) = line.split_once(' ').unwrap_or((line, ""));

  let complete_alias = alias.is_empty() || (rest.is_empty() && !line.ends_with(' '));

  (alias, rest, complete_alias)
}

/// Iterator over the space-separated tokens of an argument string.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
  input: &'a str,
  pos:   usize,
  done:  bool,
}

impl<'a> Tokenizer<'a> {
  pub fn new(input: &'a str) -> Self {
    Self {
      input,
      pos: 0,
      done: input.is_empty(),
    }
  }

  /// Byte offset of the next token.
  pub fn pos(&self) -> usize {
    self.pos
  }

  /// Returns everything that has not been tokenized yet.
  pub fn rest(&mut self) -> Option<&'a str> {
    if self.done {
      return None;
    }
    self.done = true;
    Some(&self.input[self.pos..])
  }
}

impl<'a> Iterator for Tokenizer<'a> {
  type Item = &'a str;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    let rest = &self.input[self.pos..];
    match rest.find(' ') {
      Some(end) => {
        self.pos += end + 1;
        Some(&rest[..end])
      },
      None => {
        self.done = true;
        self.pos = self.input.len();
        Some(rest)
      },
    }
  }
}

/// Tokenizes an argument string into owned tokens.
///
/// An empty input yields no tokens; any other input yields one more token
/// than it has spaces.
pub fn tokenize(input: &str) -> Vec<String> {
  Tokenizer::new(input).map(str::to_string).collect()
}

/// Tokenizes a line meant for completion.
///
/// Returns the completed tokens and the partial token being typed. A line
/// ending in a space has an empty partial token.
pub fn tokenize_partial(input: &str) -> (Vec<String>, String) {
  let mut tokens = tokenize(input);
  let partial = tokens.pop().unwrap_or_default();
  (tokens, partial)
}
