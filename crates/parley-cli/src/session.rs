use anyhow::{anyhow, Result};
use futures::StreamExt;

use crate::prompt::{InputType, Prompt, HELP};
use parley::conversation::{Conversation, TurnEvent, TurnOutcome};
use parley::models::message::HistoryEntry;

pub struct Session<'a> {
    conversation: Conversation,
    prompt: Box<dyn Prompt + 'a>,
    model: String,
    system: String,
    history: Vec<HistoryEntry>,
}

impl<'a> Session<'a> {
    pub fn new(
        conversation: Conversation,
        prompt: Box<dyn Prompt + 'a>,
        model: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        Session {
            conversation,
            prompt,
            model: model.into(),
            system: system.into(),
            history: Vec::new(),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.render_info(&format!(
            "Chatting with {}. Type /? for help.",
            self.model
        ));

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        self.process(&content).await;
                    }
                }
                InputType::Exit => break,
                InputType::AskAgain => continue,
                InputType::Clear => {
                    self.history.clear();
                    self.prompt.render_info("Started a new conversation.");
                }
                InputType::ListTools => {
                    let tools = self.tool_summary();
                    self.prompt.render_info(&tools);
                }
                InputType::Help => self.prompt.render_info(HELP),
            }
        }
        self.prompt.close();
        Ok(())
    }

    /// Run a single turn without reading input
    pub async fn headless_start(&mut self, message: &str) -> Result<()> {
        let outcome = self.process(message).await;
        self.prompt.close();
        outcome
            .map(|_| ())
            .ok_or_else(|| anyhow!("the reply did not complete"))
    }

    fn tool_summary(&self) -> String {
        let tools = self.conversation.tools().available_tools();
        let mut summary = String::from("Available tools:");
        for tool in tools {
            summary.push_str(&format!("\n  {} - {}", tool.name, tool.description));
        }
        summary
    }

    /// Stream one turn to the prompt. History only records turns that finished.
    async fn process(&mut self, text: &str) -> Option<TurnOutcome> {
        self.prompt.show_busy();

        let outcome = {
            let mut stream = self
                .conversation
                .reply(&self.history, text, &self.model, &self.system);
            let mut outcome = None;
            loop {
                tokio::select! {
                    event = stream.next() => match event {
                        Some(Ok(TurnEvent::TextDelta(chunk))) => {
                            self.prompt.hide_busy();
                            self.prompt.render_text(&chunk);
                        }
                        Some(Ok(TurnEvent::ToolActivity(label))) => {
                            self.prompt.hide_busy();
                            self.prompt.render_activity(&label);
                            self.prompt.show_busy();
                        }
                        Some(Ok(TurnEvent::Finished(finished))) => outcome = Some(finished),
                        Some(Err(e)) => {
                            self.prompt.hide_busy();
                            self.prompt.render_error(&e.to_string());
                            break;
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        // Dropping the stream closes the in-flight request
                        self.prompt.hide_busy();
                        self.prompt.render_info("Interrupted. The last message was not kept.");
                        break;
                    }
                }
            }
            outcome
        };

        self.prompt.hide_busy();
        if let Some(outcome) = &outcome {
            self.history.push(HistoryEntry::user(text));
            self.history.push(outcome.history_entry());
            self.prompt.end_reply(outcome);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{parse_input, Input};
    use parley::providers::errors::TransportError;
    use parley::providers::mock::{MockProvider, MockReply};
    use parley::tools::ToolRegistry;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Feeds canned input lines and records everything rendered
    struct ScriptedPrompt {
        inputs: VecDeque<Input>,
        output: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedPrompt {
        fn new(lines: &[&str]) -> (Self, Arc<Mutex<Vec<String>>>) {
            let output = Arc::new(Mutex::new(Vec::new()));
            let prompt = ScriptedPrompt {
                inputs: lines.iter().map(|line| parse_input(line)).collect(),
                output: output.clone(),
            };
            (prompt, output)
        }

        fn record(&self, line: String) {
            self.output.lock().unwrap().push(line);
        }
    }

    impl Prompt for ScriptedPrompt {
        fn get_input(&mut self) -> Result<Input> {
            Ok(self.inputs.pop_front().unwrap_or(Input {
                input_type: InputType::Exit,
                content: None,
            }))
        }

        fn show_busy(&mut self) {}

        fn hide_busy(&mut self) {}

        fn render_text(&mut self, chunk: &str) {
            self.record(format!("text:{}", chunk));
        }

        fn render_activity(&mut self, label: &str) {
            self.record(format!("tool:{}", label));
        }

        fn render_info(&mut self, message: &str) {
            self.record(format!("info:{}", message));
        }

        fn render_error(&mut self, message: &str) {
            self.record(format!("error:{}", message));
        }

        fn end_reply(&mut self, outcome: &TurnOutcome) {
            self.record(format!("done:{}", outcome.iterations));
        }

        fn close(&mut self) {
            self.record("closed".to_string());
        }
    }

    fn session(
        provider: &MockProvider,
        lines: &[&str],
    ) -> (Session<'static>, Arc<Mutex<Vec<String>>>) {
        let (prompt, output) = ScriptedPrompt::new(lines);
        let conversation = Conversation::new(Box::new(provider.clone()), ToolRegistry::new());
        let session = Session::new(
            conversation,
            Box::new(prompt),
            "claude-3-5-haiku-latest",
            "Be brief.",
        );
        (session, output)
    }

    #[tokio::test]
    async fn test_history_carries_between_turns() {
        let provider = MockProvider::new(vec![
            MockReply::text(&["Hi ", "there!"]),
            MockReply::text(&["You said hello."]),
        ]);
        let (mut session, output) = session(&provider, &["hello", "what did I say?", "/exit"]);

        session.start().await.unwrap();

        assert_eq!(
            session.history,
            &[
                HistoryEntry::user("hello"),
                HistoryEntry::assistant("Hi there!"),
                HistoryEntry::user("what did I say?"),
                HistoryEntry::assistant("You said hello."),
            ]
        );
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].len(), 3);

        let output = output.lock().unwrap();
        assert!(output.contains(&"text:Hi ".to_string()));
        assert!(output.contains(&"text:there!".to_string()));
        assert_eq!(output.last().map(String::as_str), Some("closed"));
    }

    #[tokio::test]
    async fn test_clear_resets_history() {
        let provider = MockProvider::new(vec![
            MockReply::text(&["First."]),
            MockReply::text(&["Second."]),
        ]);
        let (mut session, _output) = session(&provider, &["one", "/clear", "two"]);

        session.start().await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests[1].len(), 1);
        assert_eq!(requests[1][0].text(), "two");
        assert_eq!(session.history.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_turn_is_not_recorded() {
        let provider = MockProvider::new(vec![MockReply::Error(TransportError::Status {
            status: 429,
            body: "rate limited".to_string(),
        })]);
        let (mut session, output) = session(&provider, &["hello"]);

        session.start().await.unwrap();

        assert!(session.history.is_empty());
        let output = output.lock().unwrap();
        assert!(output
            .iter()
            .any(|line| line.starts_with("error:") && line.contains("429") && line.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_tool_activity_and_commands() {
        let provider = MockProvider::new(vec![
            MockReply::tool_use("toolu_1", "get_datetime", json!({})),
            MockReply::text(&["It's Friday."]),
        ]);
        let (mut session, output) = session(&provider, &["/tools", "/?", "", "what day is it?"]);

        session.start().await.unwrap();

        let output = output.lock().unwrap();
        assert!(output
            .iter()
            .any(|line| line.starts_with("info:Available tools:") && line.contains("get_datetime")));
        assert!(output.iter().any(|line| line.contains("/clear")));
        assert!(output.contains(&"tool:Checking the date and time…".to_string()));
        assert!(output.contains(&"done:2".to_string()));
    }

    #[tokio::test]
    async fn test_headless_start() {
        let provider = MockProvider::new(vec![MockReply::text(&["Done."])]);
        let (mut session, output) = session(&provider, &[]);

        session.headless_start("do the thing").await.unwrap();

        assert_eq!(session.history.len(), 2);
        assert_eq!(
            *output.lock().unwrap(),
            vec!["text:Done.", "done:1", "closed"]
        );
    }

    #[tokio::test]
    async fn test_headless_failure_is_an_error() {
        let provider = MockProvider::new(vec![MockReply::Error(TransportError::Stream(
            "connection reset".to_string(),
        ))]);
        let (mut session, _output) = session(&provider, &[]);

        assert!(session.headless_start("hello").await.is_err());
    }
}
