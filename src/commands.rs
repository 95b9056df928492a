/// Available commands and autocomplete logic

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  Jobs,
  Applications,
  Dashboard,
  Profile,
  Purge,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub kind: CommandKind,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "jobs",
    aliases: &["j", "job", "board"],
    description: "Browse the job board",
    kind: CommandKind::Jobs,
  },
  Command {
    name: "applications",
    aliases: &["a", "apps"],
    description: "Your applications",
    kind: CommandKind::Applications,
  },
  Command {
    name: "dashboard",
    aliases: &["d", "stats"],
    description: "Dashboard counters",
    kind: CommandKind::Dashboard,
  },
  Command {
    name: "profile",
    aliases: &["p", "me"],
    description: "Your profile",
    kind: CommandKind::Profile,
  },
  Command {
    name: "purge",
    aliases: &["gc"],
    description: "Drop expired cache entries",
    kind: CommandKind::Purge,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit campus-cache",
    kind: CommandKind::Quit,
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_priority(cmd, &input_lower).map(|priority| (cmd, priority)))
    .collect();

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; None if the command doesn't match at all
fn match_priority(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Resolve typed input to a command, preferring the highlighted suggestion
pub fn resolve(input: &str, selected: usize) -> Option<CommandKind> {
  let suggestions = get_suggestions(input);
  suggestions
    .get(selected)
    .or_else(|| suggestions.first())
    .map(|cmd| cmd.kind)
}
