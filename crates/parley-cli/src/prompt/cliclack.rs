use std::io::{self, Write};

use anyhow::Result;
use cliclack::{input, spinner};
use console::style;
use parley::conversation::TurnOutcome;

use super::{parse_input, Input, InputType, Prompt};

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    busy: bool,
    input_mode: InputMode,
    /// Whether the current line holds streamed text
    mid_line: bool,
}

enum InputMode {
    Singleline,
    Multiline,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: spinner(),
            busy: false,
            input_mode: InputMode::Singleline,
            mid_line: false,
        }
    }

    fn break_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn flush() {
    if let Err(e) = io::stdout().flush() {
        tracing::debug!("failed to flush stdout: {}", e);
    }
}

/// e.g. "1234 in · 56 out · $0.0042"
fn usage_footer(outcome: &TurnOutcome) -> String {
    let mut footer = format!(
        "{} in · {} out",
        outcome.usage.input_tokens, outcome.usage.output_tokens
    );
    if let Some(cost) = outcome.cost_usd {
        footer.push_str(&format!(" · ${:.4}", cost));
    }
    if outcome.tool_calls_executed > 0 {
        footer.push_str(&format!(" · {} tool calls", outcome.tool_calls_executed));
    }
    footer
}

impl Prompt for CliclackPrompt {
    fn get_input(&mut self) -> Result<Input> {
        let mut prompt = input("You:  [Help: /?]").placeholder("");
        if let InputMode::Multiline = self.input_mode {
            prompt = prompt.multiline();
        }

        let message_text: String = match prompt.interact() {
            Ok(text) => text,
            // Ctrl+C or Esc at the prompt ends the session
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                })
            }
            Err(e) => return Err(e.into()),
        };

        match message_text.trim() {
            "/m" => {
                self.input_mode = InputMode::Multiline;
                Ok(Input {
                    input_type: InputType::AskAgain,
                    content: None,
                })
            }
            "/s" => {
                self.input_mode = InputMode::Singleline;
                Ok(Input {
                    input_type: InputType::AskAgain,
                    content: None,
                })
            }
            _ => Ok(parse_input(&message_text)),
        }
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("awaiting reply");
        self.busy = true;
    }

    fn hide_busy(&mut self) {
        if self.busy {
            self.spinner.stop("");
            self.busy = false;
        }
    }

    fn render_text(&mut self, chunk: &str) {
        print!("{}", chunk);
        flush();
        self.mid_line = !chunk.ends_with('\n');
    }

    fn render_activity(&mut self, label: &str) {
        self.break_line();
        println!("{}", style(label).cyan().italic());
        flush();
    }

    fn render_info(&mut self, message: &str) {
        self.break_line();
        println!("{}", style(message).dim());
    }

    fn render_error(&mut self, message: &str) {
        self.break_line();
        eprintln!("{} {}", style("Error:").red().bold(), message);
    }

    fn end_reply(&mut self, outcome: &TurnOutcome) {
        self.break_line();
        println!("{}", style(usage_footer(outcome)).dim());
        println!();
        flush();
    }

    fn close(&mut self) {
        self.hide_busy();
    }
}
