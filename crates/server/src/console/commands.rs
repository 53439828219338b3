use std::collections::{HashMap, VecDeque};

use tracing::warn;

const MAX_PENDING_COMMANDS: usize = 128;

/// Operator command that needs the world; executed on the simulation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ServerCommand {
    Turn,
    Advance { turns: u64 },
    Login { name: String },
    Logout { name: String },
    Talk { player: String, npc: String, text: String },
    Npcs,
    Spawn { def_name: String, zone: Option<String> },
    Engage { player: String, creature: u64 },
    Save { name: String },
    Reload,
    Metrics,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedCommand {
    Help,
    Queueable(ServerCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

type ParseFn = fn(&[String]) -> Result<ParsedCommand, CommandParseError>;

struct CommandSpec {
    name: &'static str,
    help: &'static str,
    arg_schema: &'static str,
    parse: ParseFn,
}

const BUILTINS: [(&str, &str, &str, ParseFn); 13] = [
    ("help", "List commands", "", parse_help),
    ("turn", "Show the current turn", "", parse_turn),
    ("advance", "Run turns immediately", "[turns:u64]", parse_advance),
    ("login", "Log a player in, restoring any save", "<name>", parse_login),
    ("logout", "Save and remove a player", "<name>", parse_logout),
    ("talk", "Say something to an NPC", "<player> <npc> <text...>", parse_talk),
    ("npcs", "List registered NPCs", "", parse_npcs),
    ("spawn", "Spawn a creature by def name", "<def_name> [zone]", parse_spawn),
    (
        "engage",
        "Start combat between a player and a creature",
        "<player> <creature_id:u64>",
        parse_engage,
    ),
    ("save", "Save a logged-in player", "<name>", parse_save),
    ("reload", "Reload changed scripts", "", parse_reload),
    ("metrics", "Show the latest turn metrics", "", parse_metrics),
    ("quit", "Stop the server", "", parse_quit),
];

pub(crate) struct ConsoleCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl ConsoleCommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_server_builtins() -> Self {
        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in BUILTINS {
            if let Err(error) = registry.register(name, help, arg_schema, parse) {
                warn!(command = name, error = %error, "console_builtin_rejected");
            }
        }
        registry
    }

    pub(crate) fn register(
        &mut self,
        name: &'static str,
        help: &'static str,
        arg_schema: &'static str,
        parse: ParseFn,
    ) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help,
            arg_schema,
            parse,
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }
}

/// Turns raw console lines into queued commands; help and errors are answered directly.
pub(crate) struct ConsoleCommandProcessor {
    registry: ConsoleCommandRegistry,
    pending: VecDeque<ServerCommand>,
}

impl Default for ConsoleCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleCommandProcessor {
    pub(crate) fn new() -> Self {
        Self {
            registry: ConsoleCommandRegistry::with_server_builtins(),
            pending: VecDeque::new(),
        }
    }

    /// Returns lines to print right away.
    pub(crate) fn process_line(&mut self, raw_line: &str) -> Vec<String> {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let tokens = match tokenize_line(trimmed) {
            Ok(tokens) => tokens,
            Err(reason) => return vec![format!("error: {reason}. usage: help")],
        };
        let Some((command_name, args)) = tokens.split_first() else {
            return Vec::new();
        };
        let Some(spec) = self.registry.lookup(command_name) else {
            return vec![format!("error: unknown command '{command_name}'. try: help")];
        };

        match (spec.parse)(args) {
            Ok(ParsedCommand::Help) => self.registry.help_lines(),
            Ok(ParsedCommand::Queueable(command)) => {
                self.push_queueable(command);
                Vec::new()
            }
            Err(error) => vec![format!("error: {}. usage: {}", error.reason, error.usage)],
        }
    }

    pub(crate) fn drain_commands_into(&mut self, out: &mut Vec<ServerCommand>) {
        out.extend(self.pending.drain(..));
    }

    fn push_queueable(&mut self, command: ServerCommand) {
        if self.pending.len() == MAX_PENDING_COMMANDS {
            self.pending.pop_front();
        }
        self.pending.push_back(command);
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if seen_token_content {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_help(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedCommand::Help)
}

fn parse_turn(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "turn")?;
    Ok(ParsedCommand::Queueable(ServerCommand::Turn))
}

fn parse_advance(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let turns = match args {
        [] => 1,
        [count] => count.parse::<u64>().map_err(|_| {
            CommandParseError::new(
                format!("invalid turn count '{count}' (expected u64)"),
                "advance [turns]",
            )
        })?,
        _ => {
            return Err(CommandParseError::new(
                "expected at most one argument [turns]",
                "advance [turns]",
            ))
        }
    };
    Ok(ParsedCommand::Queueable(ServerCommand::Advance { turns }))
}

fn parse_login(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let name = single_name(args, "login <name>")?;
    Ok(ParsedCommand::Queueable(ServerCommand::Login { name }))
}

fn parse_logout(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let name = single_name(args, "logout <name>")?;
    Ok(ParsedCommand::Queueable(ServerCommand::Logout { name }))
}

fn parse_save(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let name = single_name(args, "save <name>")?;
    Ok(ParsedCommand::Queueable(ServerCommand::Save { name }))
}

fn parse_talk(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let [player, npc, text @ ..] = args else {
        return Err(CommandParseError::new(
            "expected <player> <npc> <text...>",
            "talk <player> <npc> <text...>",
        ));
    };
    if text.is_empty() {
        return Err(CommandParseError::new(
            "missing required argument <text...>",
            "talk <player> <npc> <text...>",
        ));
    }
    Ok(ParsedCommand::Queueable(ServerCommand::Talk {
        player: player.clone(),
        npc: npc.clone(),
        text: text.join(" "),
    }))
}

fn parse_npcs(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "npcs")?;
    Ok(ParsedCommand::Queueable(ServerCommand::Npcs))
}

fn parse_spawn(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    match args {
        [def_name] => Ok(ParsedCommand::Queueable(ServerCommand::Spawn {
            def_name: def_name.clone(),
            zone: None,
        })),
        [def_name, zone] => Ok(ParsedCommand::Queueable(ServerCommand::Spawn {
            def_name: def_name.clone(),
            zone: Some(zone.clone()),
        })),
        _ => Err(CommandParseError::new(
            "expected <def_name> or <def_name> <zone>",
            "spawn <def_name> [zone]",
        )),
    }
}

fn parse_engage(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let [player, creature] = args else {
        return Err(CommandParseError::new(
            "expected exactly two arguments <player> <creature_id>",
            "engage <player> <creature_id>",
        ));
    };
    let creature = creature.trim_start_matches('#').parse::<u64>().map_err(|_| {
        CommandParseError::new(
            format!("invalid creature id '{creature}' (expected u64)"),
            "engage <player> <creature_id>",
        )
    })?;
    Ok(ParsedCommand::Queueable(ServerCommand::Engage {
        player: player.clone(),
        creature,
    }))
}

fn parse_reload(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "reload")?;
    Ok(ParsedCommand::Queueable(ServerCommand::Reload))
}

fn parse_metrics(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "metrics")?;
    Ok(ParsedCommand::Queueable(ServerCommand::Metrics))
}

fn parse_quit(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ParsedCommand::Queueable(ServerCommand::Quit))
}

fn single_name(args: &[String], usage: &str) -> Result<String, CommandParseError> {
    match args {
        [name] => Ok(name.clone()),
        _ => Err(CommandParseError::new(
            "expected exactly one argument <name>",
            usage,
        )),
    }
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(processor: &mut ConsoleCommandProcessor) -> Vec<ServerCommand> {
        let mut queued = Vec::new();
        processor.drain_commands_into(&mut queued);
        queued
    }

    #[test]
    fn help_lists_commands_in_registration_order() {
        let mut processor = ConsoleCommandProcessor::new();
        let lines = processor.process_line("help");

        assert_eq!(lines[0], "help - List commands");
        assert_eq!(lines[2], "advance [turns:u64] - Run turns immediately");
        assert_eq!(
            lines[5],
            "talk <player> <npc> <text...> - Say something to an NPC"
        );
        assert_eq!(lines.last().map(String::as_str), Some("quit - Stop the server"));
        assert!(drain(&mut processor).is_empty());
    }

    #[test]
    fn unknown_command_reports_clear_error() {
        let mut processor = ConsoleCommandProcessor::new();
        assert_eq!(
            processor.process_line("nope"),
            vec!["error: unknown command 'nope'. try: help"]
        );
    }

    #[test]
    fn bad_args_report_usage_hint() {
        let mut processor = ConsoleCommandProcessor::new();
        assert_eq!(
            processor.process_line("engage hero rat"),
            vec!["error: invalid creature id 'rat' (expected u64). usage: engage <player> <creature_id>"]
        );
        assert!(drain(&mut processor).is_empty());
    }

    #[test]
    fn queueable_commands_keep_order_and_arguments() {
        let mut processor = ConsoleCommandProcessor::new();
        for line in [
            "LOGIN hero",
            "talk hero Zelan \"will you\" help",
            "advance",
            "advance 12",
            "spawn unicorn -7_deniran_atlantis",
            "engage hero #4",
            "quit",
        ] {
            assert!(processor.process_line(line).is_empty(), "{line}");
        }

        assert_eq!(
            drain(&mut processor),
            vec![
                ServerCommand::Login {
                    name: "hero".to_string()
                },
                ServerCommand::Talk {
                    player: "hero".to_string(),
                    npc: "Zelan".to_string(),
                    text: "will you help".to_string(),
                },
                ServerCommand::Advance { turns: 1 },
                ServerCommand::Advance { turns: 12 },
                ServerCommand::Spawn {
                    def_name: "unicorn".to_string(),
                    zone: Some("-7_deniran_atlantis".to_string()),
                },
                ServerCommand::Engage {
                    player: "hero".to_string(),
                    creature: 4,
                },
                ServerCommand::Quit,
            ]
        );
    }

    #[test]
    fn talk_requires_text() {
        let mut processor = ConsoleCommandProcessor::new();
        assert_eq!(
            processor.process_line("talk hero Zelan"),
            vec!["error: missing required argument <text...>. usage: talk <player> <npc> <text...>"]
        );
    }

    #[test]
    fn tokenizer_handles_quotes_and_errors() {
        assert_eq!(
            tokenize_line("talk hero \"Tomi the crier\" hi").expect("tokens"),
            vec!["talk", "hero", "Tomi the crier", "hi"]
        );
        assert_eq!(tokenize_line("say \"\"").expect("tokens"), vec!["say", ""]);
        assert!(tokenize_line("talk \"oops").is_err());
    }

    #[test]
    fn pending_queue_is_bounded() {
        let mut processor = ConsoleCommandProcessor::new();
        for _ in 0..(MAX_PENDING_COMMANDS + 4) {
            processor.process_line("turn");
        }
        assert_eq!(drain(&mut processor).len(), MAX_PENDING_COMMANDS);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ConsoleCommandRegistry::with_server_builtins();
        assert!(registry.register("TURN", "again", "", parse_turn).is_err());
        assert!(registry.register(" ", "blank", "", parse_turn).is_err());
    }
}
