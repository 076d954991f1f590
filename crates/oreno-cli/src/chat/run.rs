use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use oreno_core::{Controller, OrenoAgent};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::render::Printer;
use super::view::TranscriptView;

pub struct Banner {
    pub model: String,
    pub tools: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    Stop,
    Prompt(String),
}

impl Command {
    fn parse(input: &str) -> Self {
        match input.trim() {
            "/quit" | "/exit" => Command::Quit,
            "/stop" => Command::Stop,
            _ => Command::Prompt(input.to_string()),
        }
    }
}

/// Collects input lines; a trailing `\` continues the prompt on the next line.
#[derive(Default)]
struct PromptBuffer {
    lines: Vec<String>,
}

impl PromptBuffer {
    fn push(&mut self, line: &str) -> Option<String> {
        if let Some(head) = line.strip_suffix('\\') {
            self.lines.push(head.to_string());
            return None;
        }
        self.lines.push(line.to_string());
        Some(std::mem::take(&mut self.lines).join("\n"))
    }
}

pub async fn run(
    controller: Controller,
    agent: Arc<OrenoAgent>,
    banner: Banner,
    poll_interval_ms: u64,
) -> Result<()> {
    // Plain thread: a blocked stdin read must not hold up runtime shutdown.
    let (line_tx, mut line_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let mut printer = Printer::new(io::stdout());
    printer.banner(&banner.model, &banner.tools)?;

    let mut view = TranscriptView::new();
    let mut pending = PromptBuffer::default();
    let mut input_open = true;
    let mut was_running = false;
    let mut ticker = tokio::time::interval(Duration::from_millis(poll_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Read before syncing so a finished turn's last records print first.
                let running = controller.is_running();
                for update in view.sync(&controller) {
                    printer.render(&update)?;
                }
                if was_running && !running {
                    let (input, output) = agent.total_tokens();
                    printer.usage(input, output)?;
                }
                was_running = running;
                printer.flush()?;
                if !input_open && !running {
                    break;
                }
            }
            line = line_rx.recv(), if input_open => {
                let Some(line) = line else {
                    debug!("stdin closed, exiting once idle");
                    input_open = false;
                    continue;
                };
                let Some(input) = pending.push(&line) else { continue };
                match Command::parse(&input) {
                    Command::Quit => {
                        controller.stop();
                        break;
                    }
                    Command::Stop => {
                        if !controller.stop() {
                            printer.notice("nothing to stop")?;
                        }
                    }
                    Command::Prompt(prompt) => {
                        if !controller.submit(&prompt) && controller.is_running() {
                            printer.notice("still answering; wait for it or type /stop")?;
                        }
                    }
                }
            }
        }
    }

    for update in view.sync(&controller) {
        printer.render(&update)?;
    }
    printer.finish()?;
    Ok(())
}
