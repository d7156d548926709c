use std::collections::HashMap;

use engine::TaskKind;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OrderTarget {
    Coords { x: u32, y: u32 },
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScriptCommand {
    Help,
    Order { kind: TaskKind, target: OrderTarget },
    Wait { ticks: u32 },
    Status,
    Map,
    Save { slot: u32 },
    Load { slot: u32 },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}. usage: {usage}")]
pub(crate) struct CommandParseError {
    pub(crate) reason: String,
    pub(crate) usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.into(),
        }
    }
}

type ParseFn = dyn Fn(&[&str]) -> Result<ScriptCommand, CommandParseError>;
type BuiltinParseFn = fn(&[&str]) -> Result<ScriptCommand, CommandParseError>;

pub(crate) struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

impl CommandSpec {
    pub(crate) fn usage(&self) -> String {
        if self.arg_schema.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.arg_schema)
        }
    }
}

fn build_help(summary: &str, kind: TaskKind) -> String {
    match kind.cost() {
        Some(cost) => format!("{summary} (costs {} {})", cost.amount, cost.resource),
        None => summary.to_string(),
    }
}

pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_builtins() -> Self {
        let builtins: [(&str, String, &str, BuiltinParseFn); 12] = [
            ("help", "List commands".into(), "", parse_help_command),
            ("chop", "Order a forest tile cut down".into(), "<x> <y>", parse_chop_command),
            ("mine", "Order a mountain tile dug out".into(), "<x> <y>", parse_mine_command),
            (
                "build_wood",
                build_help("Order a wooden wall", TaskKind::BuildWood),
                "<x> <y>",
                parse_build_wood_command,
            ),
            (
                "build_stone",
                build_help("Order a stone wall", TaskKind::BuildStone),
                "<x> <y>",
                parse_build_stone_command,
            ),
            (
                "task",
                "Order work by tile index".into(),
                "<kind:chop|mine|build_wood|build_stone> <index>",
                parse_task_command,
            ),
            ("wait", "Run the simulation".into(), "<ticks>", parse_wait_command),
            (
                "status",
                "Print resources, dwarves, orders and loop totals".into(),
                "",
                parse_status_command,
            ),
            ("map", "Print the map".into(), "", parse_map_command),
            ("save", "Save to a slot".into(), "<slot>", parse_save_command),
            ("load", "Load from a slot".into(), "<slot>", parse_load_command),
            ("quit", "Stop reading the script".into(), "", parse_quit_command),
        ];

        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in builtins {
            registry
                .register(name, help, arg_schema, parse)
                .expect("built-in command registration should not fail");
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[&str]) -> Result<ScriptCommand, CommandParseError> + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name.insert(lower, self.specs.len() - 1);
        Ok(())
    }

    pub(crate) fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    /// Help lines in registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| format!("{} - {}", spec.usage(), spec.help))
            .collect()
    }

    /// `Ok(None)` for blank lines and `#` comments.
    pub(crate) fn parse_line(&self, raw_line: &str) -> Result<Option<ScriptCommand>, CommandParseError> {
        let line = match raw_line.split_once('#') {
            Some((before, _)) => before,
            None => raw_line,
        };
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        let Some((command_name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let Some(spec) = self.lookup(command_name) else {
            return Err(CommandParseError::new(
                format!("unknown command '{command_name}'"),
                "help",
            ));
        };
        (spec.parse)(args).map(Some)
    }
}

fn no_args(
    args: &[&str],
    usage: &str,
    command: ScriptCommand,
) -> Result<ScriptCommand, CommandParseError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(CommandParseError::new(
            format!("unexpected arguments: {}", args.join(" ")),
            usage,
        ))
    }
}

fn parse_help_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    no_args(args, "help", ScriptCommand::Help)
}

fn parse_chop_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    parse_order_command(args, TaskKind::Chop)
}

fn parse_mine_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    parse_order_command(args, TaskKind::Mine)
}

fn parse_build_wood_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    parse_order_command(args, TaskKind::BuildWood)
}

fn parse_build_stone_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    parse_order_command(args, TaskKind::BuildStone)
}

fn parse_order_command(args: &[&str], kind: TaskKind) -> Result<ScriptCommand, CommandParseError> {
    let usage = format!("{kind} <x> <y>");
    let [x, y] = args else {
        return Err(CommandParseError::new(
            "expected exactly two arguments <x> <y>",
            usage,
        ));
    };
    let x = x.parse::<u32>().map_err(|_| {
        CommandParseError::new(format!("invalid x coordinate '{x}' (expected u32)"), usage.clone())
    })?;
    let y = y.parse::<u32>().map_err(|_| {
        CommandParseError::new(format!("invalid y coordinate '{y}' (expected u32)"), usage.clone())
    })?;
    Ok(ScriptCommand::Order {
        kind,
        target: OrderTarget::Coords { x, y },
    })
}

fn parse_task_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "task <kind> <index>";
    let [kind, index] = args else {
        return Err(CommandParseError::new(
            "expected exactly two arguments <kind> <index>",
            USAGE,
        ));
    };
    let kind = TaskKind::from_token(kind).ok_or_else(|| {
        CommandParseError::new(
            format!("unknown task kind '{kind}' (expected chop|mine|build_wood|build_stone)"),
            USAGE,
        )
    })?;
    let index = index.parse::<usize>().map_err(|_| {
        CommandParseError::new(format!("invalid tile index '{index}' (expected usize)"), USAGE)
    })?;
    Ok(ScriptCommand::Order {
        kind,
        target: OrderTarget::Index(index),
    })
}

fn parse_wait_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "wait <ticks>";
    let [ticks] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <ticks>",
            USAGE,
        ));
    };
    let ticks = ticks.parse::<u32>().map_err(|_| {
        CommandParseError::new(format!("invalid tick count '{ticks}' (expected u32)"), USAGE)
    })?;
    Ok(ScriptCommand::Wait { ticks })
}

fn parse_status_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    no_args(args, "status", ScriptCommand::Status)
}

fn parse_map_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    no_args(args, "map", ScriptCommand::Map)
}

fn parse_quit_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    no_args(args, "quit", ScriptCommand::Quit)
}

fn parse_save_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    parse_slot(args, "save").map(|slot| ScriptCommand::Save { slot })
}

fn parse_load_command(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    parse_slot(args, "load").map(|slot| ScriptCommand::Load { slot })
}

fn parse_slot(args: &[&str], command: &str) -> Result<u32, CommandParseError> {
    let usage = format!("{command} <slot>");
    let [slot] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <slot>",
            usage,
        ));
    };
    slot.parse::<u32>().map_err(|_| {
        CommandParseError::new(format!("invalid slot '{slot}' (expected u32)"), usage)
    })
}
