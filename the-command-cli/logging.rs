use std::{
  fs,
  path::Path,
};

use anyhow::Result;
use log::LevelFilter;

/// Routes `log` records, and `tracing` events through its `log` feature, to
/// stderr or to `log_file`.
pub fn setup(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
  let level = match verbosity {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Info,
    2 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };

  let dispatch = fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} [{}] {}",
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level);

  let dispatch = match log_file {
    Some(path) => {
      if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
      }
      dispatch.chain(fern::log_file(path)?)
    },
    None => dispatch.chain(std::io::stderr()),
  };

  dispatch.apply()?;
  Ok(())
}
