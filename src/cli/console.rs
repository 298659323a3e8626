//! Line-mode console front end.
//!
//! Reads one command per stdin line, turns it into an [`Input`] for the
//! orchestration loop and prints new request log entries as they arrive.

use crate::cli::output::{format_log_entry, format_status_table};
use crate::cli::ConsoleArgs;
use crate::console::{run, Console, ConsoleSnapshot, Input};
use crate::device::{DeviceApi, DispenserClient};
use crate::logging::init_tracing;
use crate::test_cycle::Preset;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

const HELP: &str = "\
Commands:
  h, health            refresh device health
  +, -                 change dispense quantity (1-20)
  d, dispense          dispense the selected quantity
  p <preset>           select test preset: single, typical, stress, custom
  c+, c-               change custom test quantity (1-20)
  t, test              run a test cycle
  bt+, bt-             change burst size (1-50)
  bq+, bq-             change tokens per burst step (1-10)
  b, burst             run a burst test
  up, down, top, bottom  move the log cursor
  clear                clear the request log
  s, status            show the console state
  ?, help              show this help
  q, quit              exit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Input(Input),
    Status,
    Help,
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let input = match head.to_lowercase().as_str() {
        "h" | "health" => Input::RefreshHealth,
        "+" => Input::QuantityUp,
        "-" => Input::QuantityDown,
        "d" | "dispense" => Input::Dispense,
        "p" | "preset" => {
            let name = words
                .next()
                .ok_or_else(|| "usage: p <single|typical|stress|custom>".to_string())?;
            Input::SelectPreset(name.parse::<Preset>()?)
        }
        "c+" => Input::CustomUp,
        "c-" => Input::CustomDown,
        "t" | "test" => Input::StartTestCycle,
        "bt+" => Input::BurstTotalUp,
        "bt-" => Input::BurstTotalDown,
        "bq+" => Input::BurstQuantityUp,
        "bq-" => Input::BurstQuantityDown,
        "b" | "burst" => Input::StartBurst,
        "up" | "k" => Input::ScrollUp,
        "down" | "j" => Input::ScrollDown,
        "top" => Input::ScrollTop,
        "bottom" => Input::ScrollBottom,
        "clear" => Input::ClearLog,
        "q" | "quit" | "exit" => Input::Quit,
        "s" | "status" => return Ok(Some(Command::Status)),
        "?" | "help" => return Ok(Some(Command::Help)),
        other => return Err(format!("unknown command '{}' (type help)", other)),
    };

    Ok(Some(Command::Input(input)))
}

/// Run the interactive console until quit, EOF on stdin, or Ctrl-C.
pub async fn run_console(args: &ConsoleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.device.load_config()?;
    init_tracing(&config.logging)?;

    let client = DispenserClient::new(&config.device);
    println!("Dispenser console - {}", client.base_url());
    println!("Type 'help' for commands.");
    tracing::info!(endpoint = client.base_url(), "Console starting");

    let device: Arc<dyn DeviceApi> = Arc::new(client);
    let (input_tx, input_rx) = mpsc::channel(32);
    let (snapshot_tx, snapshot_rx) = watch::channel(ConsoleSnapshot::default());
    let cancel = CancellationToken::new();

    let console = Console::new(&config);
    let loop_handle = tokio::spawn(run(
        console,
        device,
        input_rx,
        snapshot_tx,
        cancel.clone(),
    ));

    let printer = tokio::spawn(print_log(snapshot_rx.clone()));
    let reader = tokio::spawn(read_commands(input_tx, snapshot_rx));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            signal_cancel.cancel();
        }
    });

    let console = loop_handle.await?;
    reader.abort();
    printer.abort();

    let snapshot = console.snapshot();
    println!("{}", format_status_table(&snapshot));
    Ok(())
}

/// Forward stdin commands to the loop. Dropping the sender stops the loop.
async fn read_commands(inputs: mpsc::Sender<Input>, snapshots: watch::Receiver<ConsoleSnapshot>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin");
                break;
            }
        };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Input(input))) => {
                let quitting = input == Input::Quit;
                if inputs.send(input).await.is_err() || quitting {
                    break;
                }
            }
            Ok(Some(Command::Status)) => {
                println!("{}", format_status_table(&snapshots.borrow()));
            }
            Ok(Some(Command::Help)) => println!("{}", HELP),
            Err(message) => eprintln!("{}", message),
        }
    }
}

/// Print request log entries and test verdicts as they appear.
async fn print_log(mut snapshots: watch::Receiver<ConsoleSnapshot>) {
    let mut seen = 0;
    let mut last_verdict = None;
    let mut burst_running = false;

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();

        for entry in snapshot.new_entries_since(seen) {
            println!("{}", format_log_entry(entry));
        }
        seen = snapshot.log_appended;

        let verdict = snapshot.test_cycle.last_result.clone();
        if verdict != last_verdict {
            if let Some(result) = &verdict {
                println!("Test cycle: {}", result.message);
            }
            last_verdict = verdict;
        }

        let burst = &snapshot.burst;
        if burst_running && !burst.running {
            println!(
                "Burst: {}/{} succeeded, {} failed",
                burst.succeeded, burst.total, burst.failed
            );
        }
        burst_running = burst.running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_parse_inputs() {
        assert_eq!(
            parse_command("d"),
            Ok(Some(Command::Input(Input::Dispense)))
        );
        assert_eq!(
            parse_command("  BURST "),
            Ok(Some(Command::Input(Input::StartBurst)))
        );
        assert_eq!(
            parse_command("bq-"),
            Ok(Some(Command::Input(Input::BurstQuantityDown)))
        );
        assert_eq!(parse_command("status"), Ok(Some(Command::Status)));
        assert_eq!(parse_command("q"), Ok(Some(Command::Input(Input::Quit))));
    }

    #[test]
    fn test_parse_preset() {
        assert_eq!(
            parse_command("p stress"),
            Ok(Some(Command::Input(Input::SelectPreset(Preset::Stress))))
        );
        assert!(parse_command("p").is_err());
        assert!(parse_command("p huge").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        let err = parse_command("launch").unwrap_err();
        assert!(err.contains("launch"));
    }
}
