use std::io::{self, BufRead};
use std::thread;

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

/// Reads lines on a named background thread and hands them to the simulation
/// thread, which drains the receiver between turns.
pub(crate) fn spawn_line_reader<R>(reader: R, thread_name: &str) -> io::Result<Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (line_tx, line_rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(error = %error, "console_read_failed");
                        break;
                    }
                }
            }
            debug!("console_input_closed");
        })?;
    Ok(line_rx)
}

pub(crate) fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    spawn_line_reader(io::BufReader::new(io::stdin()), "console-input")
}
