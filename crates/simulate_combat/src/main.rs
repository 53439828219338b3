use std::env;
use std::io;
use std::process::ExitCode;

use simulate_combat::{description_text, parse_args, run_simulation, usage_text, CliAction};

fn main() -> ExitCode {
    let args = env::args().skip(1).collect::<Vec<_>>();
    match parse_args(&args) {
        Ok(CliAction::Help) => {
            println!("{}", description_text());
            println!("{}", usage_text());
            ExitCode::SUCCESS
        }
        Ok(CliAction::Simulate(options)) => {
            let stdout = io::stdout();
            match run_simulation(&options, &mut stdout.lock()) {
                Ok(_) => ExitCode::SUCCESS,
                Err(error) => {
                    eprintln!("failed to write simulation output: {error}");
                    ExitCode::from(1)
                }
            }
        }
        Err(message) => {
            println!("\nERROR: {message}");
            println!("{}", usage_text());
            ExitCode::from(1)
        }
    }
}
