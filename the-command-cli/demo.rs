//! The commands the shell ships with.

use anyhow::{
  Result,
  bail,
};
use the_command::{
  CommandEnum,
  CommandGroup,
  CommandManager,
  CommandSpec,
  ConditionFailed,
  Invocation,
  MessageType,
  Parameter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
  Red,
  Green,
  Blue,
  DarkRed,
}

impl CommandEnum for Color {
  fn variants() -> &'static [Self] {
    &[Color::Red, Color::Green, Color::Blue, Color::DarkRed]
  }

  fn name(&self) -> &'static str {
    match self {
      Color::Red => "red",
      Color::Green => "green",
      Color::Blue => "blue",
      Color::DarkRed => "dark_red",
    }
  }
}

fn say(inv: &Invocation<'_>, text: impl AsRef<str>) {
  inv.issuer.send_message(MessageType::Info, text.as_ref());
}

pub fn register(manager: &CommandManager) -> Result<()> {
  manager.register_enum::<Color>();
  manager.register_parameter_condition::<u32, _>("limit", |ctx, value| {
    let max = ctx.config_parsed::<u32>("max").unwrap_or(u32::MAX);
    if *value > max {
      return Err(ConditionFailed::new(format!("At most {max} please.")));
    }
    Ok(())
  });
  manager.register_async_completion("files", |request| {
    async move {
      let mut names = Vec::new();
      let Ok(mut entries) = tokio::fs::read_dir(".").await else {
        return names;
      };
      while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&request.input) {
          names.push(name);
        }
      }
      names.sort();
      names
    }
  });

  manager.register_command(
    CommandGroup::new("demo|d")
      .description("Examples of what commands can declare")
      .command(
        CommandSpec::default_command(|inv| {
          say(inv, "Type `help` to list commands, or `?` followed by a line to complete it.");
          Ok(())
        })
        .description("Shows how to get started"),
      )
      .command(
        CommandSpec::new("echo|say", |inv| {
          say(inv, inv.get::<String>("message").map(String::as_str).unwrap_or_default());
          Ok(())
        })
        .param(Parameter::of::<String>("message"))
        .description("Repeats the rest of the line"),
      )
      .command(
        CommandSpec::new("add", |inv| {
          let a = inv.get::<i64>("a").copied().unwrap_or_default();
          let b = inv.get::<i64>("b").copied().unwrap_or_default();
          say(inv, format!("{a} + {b} = {}", a.saturating_add(b)));
          Ok(())
        })
        .param(Parameter::of::<i64>("a"))
        .param(Parameter::of::<i64>("b"))
        .completion("@range:1-5 @range:1-5")
        .description("Adds two numbers"),
      )
      .command(
        CommandSpec::new("paint", |inv| {
          let color = inv.get::<Color>("color").map_or("?", |color| color.name());
          let target = inv.get::<String>("target").map_or("?", String::as_str);
          say(inv, format!("Painted the {target} {color}."));
          Ok(())
        })
        .param(Parameter::of::<Color>("color"))
        .param(Parameter::of::<String>("target").single().default_value("wall"))
        .completion("* wall|door|roof")
        .description("Paints something"),
      )
      .command(
        CommandSpec::new("repeat", |inv| {
          let times = inv.get::<u32>("times").copied().unwrap_or(1);
          let text = inv.get::<String>("text").map_or("", String::as_str);
          for _ in 0..times {
            say(inv, text);
          }
          Ok(())
        })
        .param(Parameter::of::<u32>("times").conditions("limit:max=5"))
        .param(Parameter::of::<String>("text"))
        .description("Says something a few times"),
      )
      .command(
        CommandSpec::new("ls", |inv| {
          let path = inv.get::<String>("path").map_or(".", String::as_str);
          let entries = std::fs::read_dir(path)?;
          for entry in entries {
            say(inv, entry?.file_name().to_string_lossy());
          }
          Ok(())
        })
        .param(Parameter::of::<String>("path").single().optional())
        .completion("@files")
        .description("Lists a directory"),
      )
      .command(
        CommandSpec::new("fail", |_| bail!("this command always fails"))
          .description("Shows how handler errors are reported"),
      )
      .subgroup(
        "admin",
        CommandGroup::new("")
          .permission("%admin")
          .command(
            CommandSpec::new("whoami", |inv| {
              say(inv, format!("You are {}.", inv.issuer.name()));
              Ok(())
            })
            .root_alias("whoami"),
          )
          .command(
            CommandSpec::new("secret", |inv| {
              say(inv, "There is no secret.");
              Ok(())
            })
            .private(),
          ),
      ),
  )?;

  Ok(())
}

#[cfg(test)]
mod test {
  use std::{
    any::Any,
    sync::Mutex,
  };

  use the_command::{
    CommandIssuer,
    ManagerConfig,
  };

  use super::*;

  #[derive(Default)]
  struct Recorder(Mutex<Vec<String>>);

  impl CommandIssuer for Recorder {
    fn name(&self) -> &str {
      "recorder"
    }

    fn has_permission(&self, _permission: &str) -> bool {
      true
    }

    fn send_message(&self, _kind: MessageType, text: &str) {
      self.0.lock().unwrap().push(text.to_string());
    }

    fn as_any(&self) -> &dyn Any {
      self
    }
  }

  fn manager() -> CommandManager {
    let mut config = ManagerConfig::default();
    config.replacements.insert("admin".into(), "demo.admin".into());
    let manager = CommandManager::new(config);
    register(&manager).unwrap();
    manager
  }

  #[test]
  fn demo_commands_run() {
    let manager = manager();
    let issuer = Recorder::default();

    assert!(manager.dispatch_line(&issuer, "d add 2 3").is_success());
    assert!(manager.dispatch_line(&issuer, "demo paint DarkRed").is_success());
    assert!(manager.dispatch_line(&issuer, "demo say hello  there").is_success());
    assert!(!manager.dispatch_line(&issuer, "demo repeat 9 hi").is_success());
    assert!(manager.dispatch_line(&issuer, "whoami").is_success());

    let texts = issuer.0.lock().unwrap().clone();
    assert_eq!(texts, vec![
      "2 + 3 = 5",
      "Painted the wall dark_red.",
      "hello  there",
      "Error: At most 5 please.",
      "You are recorder.",
    ]);
  }

  #[test]
  fn demo_completions() {
    let manager = manager();
    let issuer = Recorder::default();

    assert_eq!(manager.complete_line(&issuer, "demo paint "), vec![
      "red", "green", "blue", "dark_red"
    ]);
    assert_eq!(manager.complete_line(&issuer, "demo paint red "), vec![
      "wall", "door", "roof"
    ]);
    assert_eq!(
      manager.root_command("demo").unwrap().commands("admin whoami")[0].permissions(),
      ["demo.admin"]
    );
  }

  #[test]
  fn demo_help() {
    let manager = manager();
    let issuer = Recorder::default();

    let mut help = manager.help(&issuer, "d").unwrap();
    assert!(help.entries().iter().all(|entry| !entry.command().ends_with("secret")));
    help.search(&["paint"]);
    manager.show_help(&issuer, &help);

    let texts = issuer.0.lock().unwrap().clone();
    assert_eq!(texts, vec![
      "=== Search results for d paint ===",
      "demo paint <color> [target] - Paints something",
    ]);
  }
}
