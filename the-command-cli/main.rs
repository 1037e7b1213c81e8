use std::sync::Arc;

use anyhow::{
  Context,
  Result,
};
use the_command::{
  CommandManager,
  ManagerConfig,
  MessageType,
};

use crate::{
  cli::CliOptions,
  console::ConsoleIssuer,
};

mod cli;
mod console;
mod demo;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
  let options = CliOptions::parse()?;
  logging::setup(options.verbosity, options.log_file.as_deref()).context("failed to set up logging")?;

  let mut config = match &options.config_file {
    Some(path) => ManagerConfig::load(path)?,
    None => ManagerConfig::default(),
  };
  config
    .replacements
    .entry("admin".to_string())
    .or_insert_with(|| "demo.admin".to_string());
  let manager = Arc::new(CommandManager::new(config));
  manager.set_default_exception_handler(|ctx| {
    log::warn!("{} failed for {}: {:#}", ctx.command.command(), ctx.issuer.name(), ctx.error);
    ctx.issuer.send_message(MessageType::Error, &format!("Error: {}", ctx.error));
    true
  });
  demo::register(&manager)?;

  let issuer = Arc::new(ConsoleIssuer::new(options.permissions));
  if options.exec.is_empty() {
    console::run(manager.clone(), issuer).await?;
  } else {
    for line in &options.exec {
      if let Some(err) = manager.dispatch_line(issuer.as_ref(), line).error() {
        log::debug!("'{line}' failed: {err}");
      }
    }
  }

  manager.shutdown();
  Ok(())
}
