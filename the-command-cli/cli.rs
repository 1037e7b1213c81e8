use std::path::PathBuf;

use anyhow::Result;
use clap::{
  ArgAction,
  Parser,
};

#[derive(Clone, Debug)]
pub struct CliOptions {
  pub verbosity:   u8,
  pub log_file:    Option<PathBuf>,
  pub config_file: Option<PathBuf>,
  /// Permissions held by the console. Empty means every permission.
  pub permissions: Vec<String>,
  pub exec:        Vec<String>,
}

impl CliOptions {
  pub fn parse() -> Result<Self> {
    let raw = RawCli::parse();
    raw.try_into()
  }
}

#[derive(Parser, Debug)]
#[command(name = "the-command", about = "Interactive shell for the command engine", long_about = None)]
struct RawCli {
  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count)]
  verbosity: u8,

  /// Save logs to a specific file
  #[arg(long = "log", value_name = "FILE")]
  log_file: Option<PathBuf>,

  /// Load manager settings from a specific file
  #[arg(short = 'c', long = "config", value_name = "FILE", value_parser = parse_config_file)]
  config_file: Option<PathBuf>,

  /// Only grant these permissions to the console (repeatable)
  #[arg(short = 'p', long = "permission", value_name = "NODE")]
  permissions: Vec<String>,

  /// Run a command line and exit instead of starting the shell (repeatable)
  #[arg(short = 'e', long = "exec", value_name = "LINE")]
  exec: Vec<String>,
}

impl TryFrom<RawCli> for CliOptions {
  type Error = anyhow::Error;

  fn try_from(raw: RawCli) -> Result<Self> {
    let exec = raw
      .exec
      .into_iter()
      .map(|line| line.trim_start_matches('/').to_string())
      .filter(|line| !line.trim().is_empty())
      .collect();

    Ok(Self {
      verbosity: raw.verbosity,
      log_file: raw.log_file,
      config_file: raw.config_file,
      permissions: raw.permissions,
      exec,
    })
  }
}

fn parse_config_file(value: &str) -> std::result::Result<PathBuf, String> {
  let path = PathBuf::from(value);
  if path.is_file() {
    Ok(path)
  } else {
    Err(format!("config file '{value}' does not exist"))
  }
}
