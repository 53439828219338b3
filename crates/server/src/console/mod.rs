mod commands;
mod input;

pub(crate) use commands::{ConsoleCommandProcessor, ServerCommand};
pub(crate) use input::spawn_stdin_reader;
