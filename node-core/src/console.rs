//! Operator command grammar shared by the emulator console and bring-up
//! shells.
//!
//! A line is `keyword [argument]`. Keywords are looked up case-insensitively
//! in [`COMMANDS`], which also feeds `help`.

use core::fmt;

use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{opt, preceded};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::events::{EventProducer, QueueFull};
use crate::triggers::{ConnectAndSend, Triggers};

/// Commands understood by the console.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandTag {
    Send,
    Connect,
    Switch,
    Sleep,
    Reset,
    Time,
    Mtu,
    DefaultLink,
    Status,
    Help,
}

/// Catalog entry for one command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub summary: &'static str,
}

pub const COMMANDS: [CommandSpec; 10] = [
    CommandSpec {
        name: "send",
        tag: CommandTag::Send,
        summary: "send the counter, connecting the short-range link first if needed",
    },
    CommandSpec {
        name: "connect",
        tag: CommandTag::Connect,
        summary: "request a short-range connection",
    },
    CommandSpec {
        name: "switch",
        tag: CommandTag::Switch,
        summary: "cycle to the next available link",
    },
    CommandSpec {
        name: "sleep",
        tag: CommandTag::Sleep,
        summary: "shut the link down and enter deep sleep",
    },
    CommandSpec {
        name: "reset",
        tag: CommandTag::Reset,
        summary: "factory reset the wireless stack",
    },
    CommandSpec {
        name: "time",
        tag: CommandTag::Time,
        summary: "query network time",
    },
    CommandSpec {
        name: "mtu",
        tag: CommandTag::Mtu,
        summary: "query the MTU of the current link",
    },
    CommandSpec {
        name: "default-link",
        tag: CommandTag::DefaultLink,
        summary: "move to the post-registration link",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        summary: "show node state and link",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        summary: "list commands, or describe one: help <command>",
    },
];

impl CommandTag {
    #[must_use]
    pub fn spec(self) -> &'static CommandSpec {
        let index = COMMANDS
            .iter()
            .position(|spec| spec.tag == self)
            .unwrap_or(COMMANDS.len() - 1);
        &COMMANDS[index]
    }

    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        COMMANDS
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
            .map(|spec| spec.tag)
    }
}

/// Parsed console line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleCommand {
    Send,
    Connect,
    Switch,
    Sleep,
    FactoryReset,
    Time,
    Mtu,
    DefaultLink,
    Status,
    Help(Option<CommandTag>),
}

/// What a submitted command did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Submitted {
    /// An event was queued for the dispatcher.
    Queued,
    /// Result of a connect-and-send request.
    ConnectAndSend(ConnectAndSend),
    /// Answered locally (`status`, `help`); nothing was queued.
    Local,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleError {
    Empty,
    Syntax,
    UnknownCommand,
    UnknownTopic,
    UnexpectedArgument(CommandTag),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::Syntax => f.write_str("syntax error"),
            ConsoleError::UnknownCommand => f.write_str("unknown command (try `help`)"),
            ConsoleError::UnknownTopic => f.write_str("no help for that topic"),
            ConsoleError::UnexpectedArgument(tag) => {
                write!(f, "`{}` takes no argument", tag.spec().name)
            }
        }
    }
}

impl ConsoleCommand {
    /// Parses one console line.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        if line.trim().is_empty() {
            return Err(ConsoleError::Empty);
        }

        let (name, argument) = command_line
            .parse(line)
            .map_err(|_| ConsoleError::Syntax)?;
        let tag = CommandTag::lookup(name).ok_or(ConsoleError::UnknownCommand)?;

        if tag == CommandTag::Help {
            let topic = match argument {
                Some(topic) => Some(CommandTag::lookup(topic).ok_or(ConsoleError::UnknownTopic)?),
                None => None,
            };
            return Ok(ConsoleCommand::Help(topic));
        }
        if argument.is_some() {
            return Err(ConsoleError::UnexpectedArgument(tag));
        }

        Ok(match tag {
            CommandTag::Send => ConsoleCommand::Send,
            CommandTag::Connect => ConsoleCommand::Connect,
            CommandTag::Switch => ConsoleCommand::Switch,
            CommandTag::Sleep => ConsoleCommand::Sleep,
            CommandTag::Reset => ConsoleCommand::FactoryReset,
            CommandTag::Time => ConsoleCommand::Time,
            CommandTag::Mtu => ConsoleCommand::Mtu,
            CommandTag::DefaultLink => ConsoleCommand::DefaultLink,
            CommandTag::Status => ConsoleCommand::Status,
            CommandTag::Help => ConsoleCommand::Help(None),
        })
    }

    /// Routes the command through the trigger facade.
    pub fn submit<Q: EventProducer>(self, triggers: &Triggers<'_, Q>) -> Result<Submitted, QueueFull> {
        match self {
            ConsoleCommand::Send => triggers
                .trigger_connect_and_send()
                .map(Submitted::ConnectAndSend),
            ConsoleCommand::Connect => queued(triggers.trigger_connection_request()),
            ConsoleCommand::Switch => queued(triggers.trigger_link_switch()),
            ConsoleCommand::Sleep => queued(triggers.trigger_idle_sleep()),
            ConsoleCommand::FactoryReset => queued(triggers.trigger_factory_reset()),
            ConsoleCommand::Time => queued(triggers.trigger_get_time()),
            ConsoleCommand::Mtu => queued(triggers.trigger_get_mtu()),
            ConsoleCommand::DefaultLink => queued(triggers.trigger_switch_to_default_link()),
            ConsoleCommand::Status | ConsoleCommand::Help(_) => Ok(Submitted::Local),
        }
    }
}

fn queued(result: Result<(), QueueFull>) -> Result<Submitted, QueueFull> {
    result.map(|()| Submitted::Queued)
}

fn word<'a>(input: &mut &'a str) -> Result<&'a str, ContextError> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}

fn command_line<'a>(input: &mut &'a str) -> Result<(&'a str, Option<&'a str>), ContextError> {
    multispace0.parse_next(input)?;
    let name = word.parse_next(input)?;
    let argument = opt(preceded(multispace1, word)).parse_next(input)?;
    multispace0.parse_next(input)?;
    Ok((name, argument))
}
