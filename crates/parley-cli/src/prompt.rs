use anyhow::Result;
use parley::conversation::TurnOutcome;

pub mod cliclack;

/// Terminal front end used by a session
pub trait Prompt {
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    /// A chunk of streamed assistant text
    fn render_text(&mut self, chunk: &str);
    /// A tool the assistant started using
    fn render_activity(&mut self, label: &str);
    fn render_info(&mut self, message: &str);
    fn render_error(&mut self, message: &str);
    /// Called once a reply has fully streamed
    fn end_reply(&mut self, outcome: &TurnOutcome);
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Only set for messages
}

impl Input {
    fn command(input_type: InputType) -> Self {
        Input {
            input_type,
            content: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    AskAgain,  // Nothing to send, ask again
    Message,   // User sent a message
    Exit,      // User wants to exit the session
    Clear,     // Forget the conversation so far
    ListTools, // Show which tools are active
    Help,
}

pub const HELP: &str = "Commands:
/exit, /quit - Exit the session
/clear - Start a new conversation
/tools - List the tools available to the assistant
/m, /s - Switch to multiline or singleline input
/? - Display this help message
Ctrl+C - Interrupt the current reply";

/// Interpret a line typed by the user
pub fn parse_input(text: &str) -> Input {
    let text = text.trim();
    let command = text.to_ascii_lowercase();
    match command.as_str() {
        "" => Input::command(InputType::AskAgain),
        "/exit" | "/quit" => Input::command(InputType::Exit),
        "/clear" => Input::command(InputType::Clear),
        "/tools" => Input::command(InputType::ListTools),
        "/?" | "/help" => Input::command(InputType::Help),
        _ => Input {
            input_type: InputType::Message,
            content: Some(text.to_string()),
        },
    }
}
