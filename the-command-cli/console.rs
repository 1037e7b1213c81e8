use std::{
  any::Any,
  collections::HashSet,
  sync::Arc,
};

use anyhow::Result;
use the_command::{
  CommandIssuer,
  CommandManager,
  MessageType,
};
use tokio::io::{
  AsyncBufReadExt,
  AsyncWriteExt,
  BufReader,
};

/// The terminal user.
pub struct ConsoleIssuer {
  permissions: Option<HashSet<String>>,
}

impl ConsoleIssuer {
  /// With no permissions listed the console may do anything.
  pub fn new(permissions: Vec<String>) -> Self {
    Self {
      permissions: (!permissions.is_empty()).then(|| permissions.into_iter().collect()),
    }
  }
}

impl CommandIssuer for ConsoleIssuer {
  fn name(&self) -> &str {
    "console"
  }

  fn has_permission(&self, permission: &str) -> bool {
    self
      .permissions
      .as_ref()
      .is_none_or(|permissions| permissions.contains(permission))
  }

  fn send_message(&self, kind: MessageType, text: &str) {
    match kind {
      MessageType::Error => eprintln!("{text}"),
      MessageType::Info | MessageType::Syntax => println!("{text}"),
    }
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// Reads lines from stdin until EOF or `exit`.
///
/// A line starting with `?` prints completions for the rest of the line, so
/// `?demo paint ` lists colors. `help` lists every command the console may
/// run; `help demo paint 2` searches one root and shows a page of the
/// results. Anything else is dispatched.
pub async fn run(manager: Arc<CommandManager>, issuer: Arc<ConsoleIssuer>) -> Result<()> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut stdout = tokio::io::stdout();

  loop {
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    let Some(line) = lines.next_line().await? else {
      break;
    };
    let line = line.trim_start_matches('/');

    match line.trim() {
      "" => continue,
      "exit" | "quit" => break,
      "help" => print_help(&manager, issuer.as_ref(), ""),
      trimmed => {
        if let Some(query) = trimmed.strip_prefix("help ") {
          print_help(&manager, issuer.as_ref(), query);
          continue;
        }
        if let Some(partial) = line.strip_prefix('?') {
          let suggestions = manager.complete_line_async(issuer.as_ref(), partial).await;
          println!("{}", suggestions.join("  "));
          continue;
        }

        // Handlers may block, keep them off the reactor.
        let (manager, issuer, line) = (manager.clone(), issuer.clone(), line.to_string());
        let outcome =
          tokio::task::spawn_blocking(move || manager.dispatch_line(issuer.as_ref(), &line)).await?;
        if let Some(err) = outcome.error() {
          log::debug!("command failed: {err}");
        }
      },
    }
  }

  Ok(())
}

fn print_help(manager: &CommandManager, issuer: &dyn CommandIssuer, query: &str) {
  let mut words: Vec<&str> = query.split_whitespace().collect();
  if words.is_empty() {
    for alias in manager.aliases() {
      let Some(mut help) = manager.help(issuer, &alias) else {
        continue;
      };
      // Secondary aliases repeat the primary's commands.
      let primary = help
        .entries()
        .iter()
        .any(|entry| entry.command().split(' ').next() == Some(alias.as_str()));
      if primary {
        help.set_per_page(usize::MAX);
        manager.show_help(issuer, &help);
      }
    }
    return;
  }

  let alias = words.remove(0);
  let Some(mut help) = manager.help(issuer, alias) else {
    println!("No command named {alias}.");
    return;
  };
  let page = words.last().and_then(|word| word.parse::<usize>().ok());
  if page.is_some() {
    words.pop();
  }
  help.search(words.as_slice());
  help.set_page(page.unwrap_or(1));
  manager.show_help(issuer, &help);
}
