mod common;

use common::TestIssuer;
use the_command::{
  CommandGroup,
  CommandManager,
  CommandSpec,
  Locales,
  MessageKey,
  MessageType,
  Parameter,
};

fn setup() -> CommandManager {
  let manager = CommandManager::default();
  manager
    .register_command(
      CommandGroup::new("sc|somecommand")
        .command(CommandSpec::default_command(|_| Ok(())).description("Shows the status"))
        .command(
          CommandSpec::new("give", |_| Ok(()))
            .param(Parameter::of::<String>("item").single())
            .param(Parameter::of::<i32>("amount").default_value("1"))
            .description("Gives an item"),
        )
        .command(CommandSpec::new("internal", |_| Ok(())).private())
        .subgroup(
          "admin",
          CommandGroup::new("")
            .permission("sc.admin")
            .command(CommandSpec::new("reload", |_| Ok(())).description("Reloads everything")),
        ),
    )
    .unwrap();
  manager
}

#[test]
fn test_help_lists_what_the_issuer_may_run() {
  let manager = setup();
  let issuer = TestIssuer::new("bob");

  let help = manager.help(&issuer, "SC").unwrap();
  manager.show_help(&issuer, &help);
  assert_eq!(issuer.messages(), vec![
    (MessageType::Info, "=== Showing help for sc ===".to_string()),
    (MessageType::Info, "sc - Shows the status".to_string()),
    (MessageType::Info, "sc give <item> [amount] - Gives an item".to_string()),
  ]);

  let admin = TestIssuer::new("op").with_permission("sc.admin");
  let help = manager.help(&admin, "somecommand").unwrap();
  let listed: Vec<_> = help.page_entries().map(|entry| entry.command()).collect();
  assert_eq!(listed, vec!["sc", "sc give", "sc admin reload"]);
  assert!(manager.help(&admin, "nope").is_none());
}

#[test]
fn test_help_search_and_pages() {
  let manager = setup();
  let admin = TestIssuer::new("op").with_permission("*");

  let mut help = manager.help(&admin, "sc").unwrap();
  help.search(&["reload"]);
  manager.show_help(&admin, &help);
  assert_eq!(admin.texts(), vec![
    "=== Search results for sc reload ===",
    "sc admin reload - Reloads everything",
  ]);
  admin.clear();

  help.search::<&str>(&[]);
  help.set_per_page(2);
  help.set_page(2);
  manager.show_help(&admin, &help);
  assert_eq!(admin.texts(), vec![
    "=== Showing help for sc ===",
    "sc admin reload - Reloads everything",
    "- Showing page 2 of 2 (3 results).",
  ]);
}

#[test]
fn test_help_lines_follow_the_catalog() {
  let manager = setup();
  let mut locales = Locales::new();
  locales.set(MessageKey::HelpHeader, "Commands of {command}:");
  locales.set(MessageKey::HelpFormat, "  {command} {parameters}");
  manager.set_catalog(locales);

  let issuer = TestIssuer::new("bob");
  let help = manager.help(&issuer, "sc").unwrap();
  manager.show_help(&issuer, &help);
  assert_eq!(issuer.texts(), vec![
    "Commands of sc:",
    "sc",
    "sc give <item> [amount]"
  ]);
}
