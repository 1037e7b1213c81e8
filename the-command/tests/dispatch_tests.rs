mod common;

use std::sync::{
  Arc,
  atomic::{
    AtomicUsize,
    Ordering,
  },
};

use common::{
  Calls,
  TestIssuer,
  args,
};
use the_command::{
  CommandGroup,
  CommandIssuer,
  CommandManager,
  CommandSpec,
  ConditionFailed,
  DispatchError,
  ExecutionOutcome,
  InvalidArgument,
  Invocation,
  ManagerConfig,
  Message,
  MessageKey,
  MessageType,
  Parameter,
  UnknownCommandPolicy,
};

#[derive(Debug, Clone, PartialEq)]
enum SomeObject {
  Test1,
  Test2,
  TestOther(i32),
}

#[derive(Debug, Clone, PartialEq)]
struct Player(String);

struct Sender(String);

struct Unregistered;

const PERMISSION_DENIED: &str = "I'm sorry, but you do not have permission to perform this command.";

fn setup() -> (CommandManager, Calls, Arc<AtomicUsize>) {
  let manager = CommandManager::default();
  let calls = Calls::default();
  let lookups = Arc::new(AtomicUsize::new(0));

  manager.register_context_resolver::<SomeObject, _>(|ctx| {
    let token = ctx.pop_first_arg().unwrap_or_default();
    match token.as_str() {
      "1" => Ok(SomeObject::Test1),
      "2" => Ok(SomeObject::Test2),
      other => {
        other
          .parse::<i32>()
          .map(SomeObject::TestOther)
          .map_err(|_| InvalidArgument::new("Must be a valid number"))
      },
    }
  });

  let counter = lookups.clone();
  manager.register_context_resolver::<Player, _>(move |ctx| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(Player(ctx.pop_first_arg().unwrap_or_default()))
  });

  manager.register_sender_aware_resolver::<Sender, _>(|ctx| {
    ctx
      .issuer_as::<TestIssuer>()
      .filter(|issuer| issuer.name() != "console")
      .map(|issuer| Sender(issuer.name().to_string()))
      .ok_or_else(|| InvalidArgument::key(MessageKey::NotAllowedOnConsole).without_syntax())
  });

  let admin = calls.clone();
  let default = calls.clone();
  let greet = calls.clone();
  let say = calls.clone();
  let list = calls.clone();
  let color = calls.clone();
  let whoami = calls.clone();
  let peek = calls.clone();
  manager
    .register_command(
      CommandGroup::new("sc|somecommand")
        .command(
          CommandSpec::new("admin", move |inv| {
            let target = inv.get::<Player>("target").map(|player| player.0.clone());
            admin.push(format!("admin {}", target.unwrap_or_default()));
            Ok(())
          })
          .permission("some.perm")
          .param(Parameter::of::<Player>("target")),
        )
        .command(
          CommandSpec::default_command(move |inv| {
            default.push(format!("{:?}", inv.get::<SomeObject>("obj")));
            Ok(())
          })
          .param(Parameter::of::<SomeObject>("obj")),
        )
        .command(
          CommandSpec::new("greet", move |inv| {
            greet.push(inv.get::<String>("name").cloned().unwrap_or_default());
            Ok(())
          })
          .param(Parameter::of::<String>("name").default_value("Unknown User")),
        )
        .command(
          CommandSpec::new("say", move |inv| {
            say.push(inv.get::<String>("message").cloned().unwrap_or_default());
            Ok(())
          })
          .param(Parameter::of::<String>("message")),
        )
        .command(
          CommandSpec::new("list", move |inv| {
            let items = inv.get::<Vec<String>>("items").cloned().unwrap_or_default();
            list.push(items.join("|"));
            Ok(())
          })
          .param(Parameter::of::<Vec<String>>("items").split(",")),
        )
        .command(
          CommandSpec::new("color", move |inv| {
            color.push(inv.get::<String>("color").cloned().unwrap_or_default());
            Ok(())
          })
          .param(Parameter::of::<String>("color").single().values("red|green")),
        )
        .command(
          CommandSpec::new("whoami", move |inv| {
            let sender = inv.get::<Sender>("sender").map(|sender| sender.0.clone());
            whoami.push(sender.unwrap_or_default());
            Ok(())
          })
          .param(Parameter::of::<Sender>("sender")),
        )
        .command(
          CommandSpec::new("peek", move |inv| {
            let sender = inv.get::<Sender>("sender").map(|sender| sender.0.clone());
            peek.push(sender.unwrap_or_else(|| "none".to_string()));
            Ok(())
          })
          .param(Parameter::of::<Sender>("sender").optional()),
        ),
    )
    .unwrap();

  (manager, calls, lookups)
}

#[test]
fn test_permission_denied_before_any_resolution() {
  let (manager, calls, lookups) = setup();
  let issuer = TestIssuer::new("bob");

  for line in ["admin steve", "admin"] {
    let outcome = manager.dispatch(&issuer, "sc", &args(line));
    assert_eq!(
      outcome,
      ExecutionOutcome::Failed(DispatchError::PermissionDenied { parameter: None })
    );
    assert_eq!(issuer.texts(), vec![PERMISSION_DENIED]);
    issuer.clear();
  }
  assert_eq!(lookups.load(Ordering::SeqCst), 0);
  assert!(calls.is_empty());
}

#[test]
fn test_permitted_issuer_runs_subcommand() {
  let (manager, calls, lookups) = setup();
  let issuer = TestIssuer::new("bob").with_permission("some.perm");

  let outcome = manager.dispatch(&issuer, "SC", &args("admin steve"));
  assert!(outcome.is_success());
  assert_eq!(calls.take(), vec!["admin steve"]);
  assert_eq!(lookups.load(Ordering::SeqCst), 1);

  let outcome = manager.dispatch_line(&issuer, "somecommand admin alex");
  assert!(outcome.is_success());
  assert_eq!(calls.take(), vec!["admin alex"]);
}

#[test]
fn test_default_signature_resolves_object() {
  let (manager, calls, _) = setup();
  let issuer = TestIssuer::new("bob");

  assert!(manager.dispatch(&issuer, "sc", &args("5")).is_success());
  assert!(manager.dispatch(&issuer, "sc", &args("1")).is_success());
  assert!(manager.dispatch(&issuer, "sc", &args("2")).is_success());
  assert_eq!(calls.take(), vec![
    "Some(TestOther(5))",
    "Some(Test1)",
    "Some(Test2)"
  ]);
}

#[test]
fn test_invalid_number_reports_message_and_usage() {
  let (manager, calls, _) = setup();
  let issuer = TestIssuer::new("bob");

  let outcome = manager.dispatch(&issuer, "sc", &args("abc"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::InvalidArgument(InvalidArgument::new(
      "Must be a valid number"
    )))
  );
  assert!(calls.is_empty());
  assert_eq!(issuer.messages(), vec![
    (MessageType::Error, "Error: Must be a valid number".to_string()),
    (MessageType::Syntax, "Usage: sc <obj>".to_string()),
  ]);
}

#[test]
fn test_missing_argument_names_parameter() {
  let (manager, _, _) = setup();
  let issuer = TestIssuer::new("bob").with_permission("some.perm");

  let outcome = manager.dispatch(&issuer, "sc", &args("admin"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::MissingArgument {
      parameter: "target".to_string(),
    })
  );
  assert_eq!(issuer.texts(), vec![
    "Error: Missing required argument <target>.",
    "Usage: sc admin <target>"
  ]);
}

#[test]
fn test_optional_parameter_uses_default() {
  let (manager, calls, _) = setup();
  let issuer = TestIssuer::new("bob");

  assert!(manager.dispatch(&issuer, "sc", &args("greet")).is_success());
  assert!(manager.dispatch(&issuer, "sc", &args("greet Steve")).is_success());
  assert_eq!(calls.take(), vec!["Unknown User", "Steve"]);
}

#[test]
fn test_trailing_text_is_joined_verbatim() {
  let (manager, calls, _) = setup();
  let issuer = TestIssuer::new("bob");

  let outcome = manager.dispatch_line(&issuer, "sc say hello  there,  world ");
  assert!(outcome.is_success());
  assert_eq!(calls.take(), vec!["hello  there,  world "]);
}

#[test]
fn test_split_parameter() {
  let (manager, calls, _) = setup();
  let issuer = TestIssuer::new("bob");

  assert!(manager.dispatch(&issuer, "sc", &args("list a,b,c")).is_success());
  assert_eq!(calls.take(), vec!["a|b|c"]);

  let outcome = manager.dispatch(&issuer, "sc", &args("list"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::InvalidArgument(InvalidArgument::syntax()))
  );
  assert_eq!(issuer.messages(), vec![(
    MessageType::Syntax,
    "Usage: sc list <items>".to_string()
  )]);
}

#[test]
fn test_trailing_list_defaults() {
  let manager = CommandManager::default();
  let calls = Calls::default();
  let list = |name: &'static str| {
    let calls = calls.clone();
    move |inv: &Invocation<'_>| -> anyhow::Result<()> {
      let items = inv.get::<Vec<String>>("items").map(|items| items.join("|"));
      calls.push(format!("{name} {}", items.as_deref().unwrap_or("none")));
      Ok(())
    }
  };
  manager
    .register_command(
      CommandGroup::new("p")
        .command(
          CommandSpec::new("split", list("split"))
            .param(Parameter::of::<Vec<String>>("items").split(",").default_value("x,y")),
        )
        .command(
          CommandSpec::new("opt", list("opt"))
            .param(Parameter::of::<Vec<String>>("items").split(",").optional()),
        )
        .command(
          CommandSpec::new("plain", list("plain"))
            .param(Parameter::of::<Vec<String>>("items").default_value("x y")),
        ),
    )
    .unwrap();

  let issuer = TestIssuer::new("bob");
  for line in ["split", "opt", "plain", "split a,b", "opt c", "plain d e"] {
    assert!(manager.dispatch(&issuer, "p", &args(line)).is_success(), "{line}");
  }
  assert_eq!(calls.take(), vec![
    "split x|y",
    "opt none",
    "plain x|y",
    "split a|b",
    "opt c",
    "plain d|e"
  ]);
  assert!(issuer.messages().is_empty());
}

#[test]
fn test_resolver_registered_after_command() {
  let manager = CommandManager::default();
  let calls = Calls::default();
  let alone = calls.clone();
  let counted = calls.clone();
  manager
    .register_command(
      CommandGroup::new("p")
        .command(
          CommandSpec::new("who", move |_| {
            alone.push("sender-only");
            Ok(())
          })
          .param(Parameter::of::<Sender>("s")),
        )
        .command(
          CommandSpec::new("who", move |inv| {
            let n = inv.get::<i32>("n").copied().unwrap_or_default();
            counted.push(format!("sender+n={n}"));
            Ok(())
          })
          .param(Parameter::of::<Sender>("s"))
          .param(Parameter::of::<i32>("n")),
        ),
    )
    .unwrap();
  manager.register_sender_aware_resolver::<Sender, _>(|ctx| {
    Ok(Sender(ctx.issuer().name().to_string()))
  });

  let root = manager.root_command("p").unwrap();
  let syntax: Vec<_> = root.commands("who").iter().map(|command| command.syntax()).collect();
  assert_eq!(syntax, vec!["", "<n>"]);

  let issuer = TestIssuer::new("bob");
  assert!(manager.dispatch(&issuer, "p", &args("who 5")).is_success());
  assert!(manager.dispatch(&issuer, "p", &args("who")).is_success());
  assert_eq!(calls.take(), vec!["sender+n=5", "sender-only"]);
}

#[test]
fn test_value_restriction() {
  let (manager, calls, _) = setup();
  let issuer = TestIssuer::new("bob");

  let outcome = manager.dispatch(&issuer, "sc", &args("color blue"));
  let expected =
    InvalidArgument::key(Message::key(MessageKey::PleaseSpecifyOneOf).with("valid", "red, green"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::InvalidArgument(expected))
  );
  assert_eq!(issuer.texts(), vec![
    "Error: Please specify one of (red, green).",
    "Usage: sc color <color>"
  ]);

  assert!(manager.dispatch(&issuer, "sc", &args("color RED")).is_success());
  assert_eq!(calls.take(), vec!["RED"]);
}

#[test]
fn test_sender_aware_parameters() {
  let (manager, calls, _) = setup();
  let alice = TestIssuer::new("alice");
  let console = TestIssuer::new("console");

  assert!(manager.dispatch(&alice, "sc", &args("whoami")).is_success());
  assert_eq!(calls.take(), vec!["alice"]);

  let outcome = manager.dispatch(&console, "sc", &args("whoami"));
  assert!(matches!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::InvalidArgument(_))
  ));
  assert_eq!(console.texts(), vec!["Error: Console may not execute this command."]);

  assert!(manager.dispatch(&console, "sc", &args("peek")).is_success());
  assert_eq!(calls.take(), vec!["none"]);
}

#[test]
fn test_unknown_alias_policy() {
  let (manager, _, _) = setup();
  let issuer = TestIssuer::new("bob");

  let outcome = manager.dispatch(&issuer, "nope", &[]);
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::UnknownCommand {
      alias: "nope".to_string(),
    })
  );
  assert!(issuer.messages().is_empty());

  let manager = CommandManager::new(ManagerConfig {
    unknown_command: UnknownCommandPolicy::Report,
    ..ManagerConfig::default()
  });
  assert!(!manager.dispatch(&issuer, "nope", &[]).is_success());
  assert_eq!(issuer.texts(), vec!["Unknown command, please type /help."]);
}

#[test]
fn test_conditions() {
  let manager = CommandManager::default();
  let calls = Calls::default();
  let lookups = Arc::new(AtomicUsize::new(0));
  let counter = lookups.clone();
  manager.register_context_resolver::<Player, _>(move |ctx| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(Player(ctx.pop_first_arg().unwrap_or_default()))
  });
  manager.register_condition("weekday", |ctx| {
    if ctx.has_config("closed") {
      Err(ConditionFailed::new("We are closed"))
    } else {
      Ok(())
    }
  });
  manager.register_parameter_condition::<i32, _>("limit", |ctx, value| {
    let max = ctx.config_parsed::<i32>("max").unwrap_or(i32::MAX);
    if *value > max {
      Err(ConditionFailed::new(format!("{value} is over {max}")))
    } else {
      Ok(())
    }
  });

  let buy = calls.clone();
  manager
    .register_command(
      CommandGroup::new("shop")
        .command(
          CommandSpec::new("closed", |_| Ok(()))
            .conditions("weekday:closed")
            .param(Parameter::of::<Player>("target")),
        )
        .command(
          CommandSpec::new("buy", move |inv| {
            buy.push(inv.get::<i32>("amount").map(i32::to_string).unwrap_or_default());
            Ok(())
          })
          .conditions("weekday")
          .param(Parameter::of::<i32>("amount").conditions("limit:max=3")),
        )
        .command(CommandSpec::new("broken", |_| Ok(())).conditions("nosuch")),
    )
    .unwrap();

  let issuer = TestIssuer::new("bob");
  let outcome = manager.dispatch(&issuer, "shop", &args("closed steve"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::ConditionFailed(ConditionFailed::new(
      "We are closed"
    )))
  );
  assert_eq!(lookups.load(Ordering::SeqCst), 0);
  assert_eq!(issuer.texts(), vec!["Error: We are closed"]);
  issuer.clear();

  assert!(manager.dispatch(&issuer, "shop", &args("buy 2")).is_success());
  assert_eq!(calls.take(), vec!["2"]);
  assert!(!manager.dispatch(&issuer, "shop", &args("buy 5")).is_success());
  assert!(calls.is_empty());
  assert_eq!(issuer.texts(), vec!["Error: 5 is over 3"]);
  issuer.clear();

  let outcome = manager.dispatch(&issuer, "shop", &args("broken"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::UnknownCondition {
      id: "nosuch".to_string(),
    })
  );
  assert_eq!(issuer.texts(), vec![
    "An error occurred. This problem has been logged. Sorry for the inconvenience."
  ]);
}

#[test]
fn test_missing_resolver_is_internal() {
  let manager = CommandManager::default();
  manager
    .register_command(
      CommandGroup::new("ghost")
        .command(CommandSpec::default_command(|_| Ok(())).param(Parameter::of::<Unregistered>("thing"))),
    )
    .unwrap();

  let issuer = TestIssuer::new("bob");
  let outcome = manager.dispatch(&issuer, "ghost", &args("x"));
  let err = outcome.error().unwrap();
  assert!(matches!(err, DispatchError::ResolverNotFound { .. }));
  assert!(err.is_internal());
  assert_eq!(issuer.texts().len(), 1);
}

#[test]
fn test_handler_failures() {
  let manager = CommandManager::default();
  let handled = Calls::default();
  let seen = handled.clone();
  manager
    .register_command(
      CommandGroup::new("h")
        .command(CommandSpec::new("boom", |_| Err(anyhow::anyhow!("boom"))))
        .command(CommandSpec::new("reject", |_| Err(InvalidArgument::new("bad input").into())))
        .command(CommandSpec::new("panic", |_| panic!("handler panicked"))),
    )
    .unwrap();
  manager
    .register_command(
      CommandGroup::new("safe")
        .exception_handler(move |ctx| {
          seen.push(format!("{} {}", ctx.command.command(), ctx.error));
          true
        })
        .command(CommandSpec::default_command(|_| Err(anyhow::anyhow!("quiet")))),
    )
    .unwrap();

  let issuer = TestIssuer::new("bob");
  let outcome = manager.dispatch(&issuer, "h", &args("boom"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::HandlerFailed {
      message: "boom".to_string(),
      handled: false,
    })
  );
  assert_eq!(issuer.texts(), vec![
    "I'm sorry, but there was an error performing this command."
  ]);
  issuer.clear();

  let outcome = manager.dispatch(&issuer, "h", &args("reject"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::InvalidArgument(InvalidArgument::new("bad input")))
  );
  assert_eq!(issuer.texts(), vec!["Error: bad input", "Usage: h reject"]);
  issuer.clear();

  let outcome = manager.dispatch(&issuer, "h", &args("panic"));
  assert!(matches!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::HandlerFailed { handled: false, .. })
  ));
  issuer.clear();

  let outcome = manager.dispatch(&issuer, "safe", &[]);
  assert!(matches!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::HandlerFailed { handled: true, .. })
  ));
  assert!(issuer.messages().is_empty());
  assert_eq!(handled.take(), vec!["safe quiet"]);
}

#[test]
fn test_default_exception_handler() {
  let manager = CommandManager::default();
  manager.set_default_exception_handler(|ctx| {
    ctx.issuer.send_message(MessageType::Error, "custom");
    true
  });
  manager
    .register_command(
      CommandGroup::new("h").command(CommandSpec::default_command(|_| Err(anyhow::anyhow!("boom")))),
    )
    .unwrap();

  let issuer = TestIssuer::new("bob");
  assert!(!manager.dispatch(&issuer, "h", &[]).is_success());
  assert_eq!(issuer.texts(), vec!["custom"]);
}

#[test]
fn test_overload_selection_does_not_backtrack() {
  let manager = CommandManager::default();
  let calls = Calls::default();
  let one = calls.clone();
  let two = calls.clone();
  manager
    .register_command(
      CommandGroup::new("ov")
        .command(
          CommandSpec::new("give", move |_| {
            one.push("one");
            Ok(())
          })
          .param(Parameter::of::<i32>("a")),
        )
        .command(
          CommandSpec::new("give", move |_| {
            two.push("two");
            Ok(())
          })
          .param(Parameter::of::<i32>("a"))
          .param(Parameter::of::<i32>("b")),
        ),
    )
    .unwrap();

  let issuer = TestIssuer::new("bob");
  for _ in 0..3 {
    assert!(manager.dispatch(&issuer, "ov", &args("give 1")).is_success());
    assert!(manager.dispatch(&issuer, "ov", &args("give 1 2")).is_success());
  }
  assert_eq!(calls.take(), vec!["one", "two", "one", "two", "one", "two"]);

  let outcome = manager.dispatch(&issuer, "ov", &args("give x"));
  assert!(matches!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::InvalidArgument(_))
  ));
  assert_eq!(issuer.texts(), vec!["Error: x must be a number.", "Usage: ov give <a>"]);
  issuer.clear();

  let outcome = manager.dispatch(&issuer, "ov", &args("give 1 2 3"));
  assert_eq!(
    outcome,
    ExecutionOutcome::Failed(DispatchError::NoMatchingCommand {
      command: "ov give".to_string(),
    })
  );
  assert_eq!(issuer.texts(), vec!["Usage: ov give <a>"]);
}

#[test]
fn test_unregister_and_shutdown() {
  let (manager, _, _) = setup();
  let other = manager
    .register_command(CommandGroup::new("other").command(CommandSpec::default_command(|_| Ok(()))))
    .unwrap();
  assert_eq!(manager.aliases(), vec!["other", "sc", "somecommand"]);

  manager.unregister_command(other).unwrap();
  assert_eq!(manager.aliases(), vec!["sc", "somecommand"]);
  assert!(manager.unregister_command(other).is_err());

  let issuer = TestIssuer::new("bob");
  assert!(matches!(
    manager.dispatch(&issuer, "other", &[]),
    ExecutionOutcome::Failed(DispatchError::UnknownCommand { .. })
  ));

  manager.shutdown();
  assert!(manager.aliases().is_empty());
  assert!(matches!(
    manager.dispatch(&issuer, "sc", &args("5")),
    ExecutionOutcome::Failed(DispatchError::UnknownCommand { .. })
  ));
}
