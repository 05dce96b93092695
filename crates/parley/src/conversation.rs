use futures::stream::{BoxStream, StreamExt, TryStreamExt};

use crate::errors::TurnError;
use crate::models::message::{HistoryEntry, Message};
use crate::pricing;
use crate::providers::accumulator::{StopReason, StreamAccumulator};
use crate::providers::base::{Provider, Usage};
use crate::tools::{activity_label, ToolRegistry};

/// Upper bound on streaming calls in a single turn
pub const MAX_ITERATIONS: usize = 5;

/// Incremental output of a turn, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A chunk of assistant text, to be shown immediately
    TextDelta(String),
    /// A tool is about to run
    ToolActivity(String),
    /// The turn is complete. Always the last event of a successful turn.
    Finished(TurnOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Every text delta of the turn, concatenated
    pub text: String,
    pub usage: Usage,
    /// `None` when the model has no known pricing
    pub cost_usd: Option<f64>,
    /// Streaming calls made
    pub iterations: usize,
    pub tool_calls_executed: usize,
}

impl TurnOutcome {
    /// The assistant entry to persist for this turn
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry::assistant(self.text.clone())
    }
}

/// Drives one user turn through model replies and tool rounds
pub struct Conversation {
    provider: Box<dyn Provider>,
    tools: ToolRegistry,
}

impl Conversation {
    pub fn new(provider: Box<dyn Provider>, tools: ToolRegistry) -> Self {
        Self { provider, tools }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Messages sent on the first streaming call of a turn
    fn seed_messages(history: &[HistoryEntry], user_text: &str) -> Vec<Message> {
        history
            .iter()
            .filter(|entry| !entry.text.trim().is_empty())
            .map(Message::from)
            .chain(std::iter::once(Message::user().with_text(user_text)))
            .collect()
    }

    /// Stream the events of one turn. Dropping the stream cancels the turn, including any
    /// in-flight request.
    pub fn reply(
        &self,
        history: &[HistoryEntry],
        user_text: &str,
        model: &str,
        system: &str,
    ) -> BoxStream<'_, Result<TurnEvent, TurnError>> {
        let mut messages = Self::seed_messages(history, user_text);
        let model = model.to_string();
        let system = system.to_string();
        let tools = self.tools.available_tools();

        Box::pin(async_stream::try_stream! {
            let mut text = String::new();
            let mut usage = Usage::default();
            let mut iterations = 0;
            let mut tool_calls_executed = 0;

            loop {
                iterations += 1;
                tracing::debug!(iteration = iterations, messages = messages.len(), "requesting model reply");

                let mut events = self
                    .provider
                    .stream(&model, &system, &messages, &tools)
                    .await
                    .map_err(|source| {
                        tracing::warn!(error = %source, "model request failed");
                        TurnError::transport(source, text.clone())
                    })?;

                let mut accumulator = StreamAccumulator::new();
                while let Some(event) = events.next().await {
                    let event = event.map_err(|source| {
                        tracing::warn!(error = %source, "model stream failed");
                        TurnError::transport(source, format!("{}{}", text, accumulator.text()))
                    })?;
                    if let Some(chunk) = accumulator.apply(&event) {
                        yield TurnEvent::TextDelta(chunk);
                    }
                }
                let result = accumulator.finish();

                text.push_str(&result.text);
                usage += result.usage;

                if result.stop_reason == StopReason::EndTurn || result.tool_calls.is_empty() {
                    break;
                }

                // Replay the request verbatim so each result has its matching tool_use
                let mut request = Message::assistant();
                if !result.text.is_empty() {
                    request = request.with_text(result.text.clone());
                }
                for call in &result.tool_calls {
                    request = request.with_tool_request(call.clone());
                    yield TurnEvent::ToolActivity(activity_label(call));
                }
                messages.push(request);

                let responses = self.tools.dispatch_all(&result.tool_calls).await;
                tool_calls_executed += responses.len();
                messages.push(
                    responses
                        .into_iter()
                        .fold(Message::user(), Message::with_tool_response),
                );

                if iterations >= MAX_ITERATIONS {
                    tracing::warn!(iterations, "tool rounds exhausted, ending turn");
                    break;
                }
            }

            tracing::debug!(
                iterations,
                tool_calls_executed,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "turn finished"
            );
            yield TurnEvent::Finished(TurnOutcome {
                cost_usd: pricing::cost_usd(&model, &usage),
                text,
                usage,
                iterations,
                tool_calls_executed,
            });
        })
    }

    /// Run a turn to completion, reporting text and tool activity through callbacks
    pub async fn run_turn<T, A>(
        &self,
        history: &[HistoryEntry],
        user_text: &str,
        model: &str,
        system: &str,
        mut on_text: T,
        mut on_tool_activity: A,
    ) -> Result<(String, Usage), TurnError>
    where
        T: FnMut(&str),
        A: FnMut(&str),
    {
        let mut stream = self.reply(history, user_text, model, system);
        let mut finished = (String::new(), Usage::default());
        while let Some(event) = stream.try_next().await? {
            match event {
                TurnEvent::TextDelta(chunk) => on_text(&chunk),
                TurnEvent::ToolActivity(label) => on_tool_activity(&label),
                TurnEvent::Finished(outcome) => finished = (outcome.text, outcome.usage),
            }
        }
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ToolError, ToolResult};
    use crate::models::message::MessageContent;
    use crate::models::role::Role;
    use crate::models::tool::ToolCall;
    use crate::providers::errors::TransportError;
    use crate::providers::mock::{MockProvider, MockReply, ScriptBuilder};
    use crate::tools::weather::{Conditions, Place, WeatherService};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const MODEL: &str = "claude-3-5-sonnet-latest";

    /// Records every location it is asked about
    #[derive(Default)]
    struct RecordingWeather {
        lookups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WeatherService for RecordingWeather {
        async fn geocode(&self, location: &str) -> ToolResult<Option<Place>> {
            if let Ok(mut lookups) = self.lookups.lock() {
                lookups.push(location.to_string());
            }
            if location == "Atlantis" {
                return Ok(None);
            }
            Ok(Some(Place {
                name: location.to_string(),
                lat: 39.27,
                lon: -76.73,
                state: None,
                country: None,
            }))
        }

        async fn current(&self, _place: &Place) -> ToolResult<Conditions> {
            Ok(Conditions {
                description: "clear sky".to_string(),
                temperature_f: 68.0,
                feels_like_f: 67.0,
                humidity: 52,
                wind_mph: 3.0,
            })
        }
    }

    struct BrokenWeather;

    #[async_trait]
    impl WeatherService for BrokenWeather {
        async fn geocode(&self, _location: &str) -> ToolResult<Option<Place>> {
            Err(ToolError::Status {
                status: 401,
                body: "Invalid API key".to_string(),
            })
        }

        async fn current(&self, _place: &Place) -> ToolResult<Conditions> {
            unreachable!("geocode always fails")
        }
    }

    async fn collect(stream: BoxStream<'_, Result<TurnEvent, TurnError>>) -> Vec<TurnEvent> {
        stream.try_collect().await.expect("turn should succeed")
    }

    fn outcome(events: &[TurnEvent]) -> &TurnOutcome {
        match events.last() {
            Some(TurnEvent::Finished(outcome)) => outcome,
            other => panic!("expected Finished as the last event, got {:?}", other),
        }
    }

    fn streamed_text(events: &[TurnEvent]) -> String {
        events
            .iter()
            .filter_map(|event| match event {
                TurnEvent::TextDelta(chunk) => Some(chunk.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_simple_reply() {
        let provider = MockProvider::new(vec![MockReply::text(&[
            "Doing well, ",
            "thanks for asking!",
        ])]);
        let conversation = Conversation::new(Box::new(provider.clone()), ToolRegistry::new());

        let events = collect(conversation.reply(&[], "Hey, how's it going?", MODEL, "")).await;

        let outcome = outcome(&events);
        assert_eq!(outcome.text, "Doing well, thanks for asking!");
        assert_eq!(outcome.text, streamed_text(&events));
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.tool_calls_executed, 0);
        assert_eq!(outcome.usage, Usage::new(10, 5));
        assert!(outcome.cost_usd.is_some());
        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            provider.requests()[0],
            vec![Message::user().with_text("Hey, how's it going?")]
        );
    }

    #[tokio::test]
    async fn test_history_is_seeded_without_empty_entries() {
        let provider = MockProvider::new(vec![MockReply::text(&["Sure."])]);
        let conversation = Conversation::new(Box::new(provider.clone()), ToolRegistry::new());
        let history = vec![
            HistoryEntry::user("What's 2 + 2?"),
            HistoryEntry::assistant("4"),
            HistoryEntry::assistant("  "),
        ];

        collect(conversation.reply(&history, "And 3 + 3?", MODEL, "Be brief")).await;

        let sent = &provider.requests()[0];
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].role, Role::User);
        assert_eq!(sent[1], Message::assistant().with_text("4"));
        assert_eq!(sent[2].text(), "And 3 + 3?");
    }

    #[tokio::test]
    async fn test_weather_tool_round() {
        let weather = Arc::new(RecordingWeather::default());
        let provider = MockProvider::new(vec![
            ScriptBuilder::new()
                .text(&["Let me check."])
                .tool_use("toolu_1", "get_weather", &["{\"locat", "ion\": \"\"}"])
                .stop("tool_use")
                .build(),
            MockReply::text(&[" It's 68°F and clear."]),
        ]);
        let registry = ToolRegistry::new().with_weather(weather.clone());
        let conversation = Conversation::new(Box::new(provider.clone()), registry);

        let events = collect(conversation.reply(&[], "What's the weather?", MODEL, "")).await;

        assert!(events.contains(&TurnEvent::ToolActivity("Checking the weather…".to_string())));
        let outcome = outcome(&events);
        assert_eq!(outcome.text, "Let me check. It's 68°F and clear.");
        assert_eq!(outcome.text, streamed_text(&events));
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.tool_calls_executed, 1);
        assert_eq!(outcome.usage, Usage::new(20, 10));

        assert_eq!(
            *weather.lookups.lock().unwrap(),
            vec!["Catonsville, Maryland".to_string()]
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        assert_eq!(second.len(), 3);

        let call = ToolCall::new("toolu_1", "get_weather", json!({"location": ""}));
        assert_eq!(
            second[1],
            Message::assistant()
                .with_text("Let me check.")
                .with_tool_request(call)
        );

        assert_eq!(second[2].role, Role::User);
        match second[2].content.as_slice() {
            [MessageContent::ToolResponse(response)] => {
                assert_eq!(response.tool_use_id, "toolu_1");
                assert!(response
                    .content
                    .starts_with("Current weather in Catonsville, Maryland:"));
            }
            other => panic!("unexpected tool result message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_tool_reports_not_available() {
        let provider = MockProvider::new(vec![
            MockReply::tool_use("toolu_1", "search_web", json!({"query": "rust news"})),
            MockReply::text(&["Search isn't set up."]),
        ]);
        let conversation = Conversation::new(Box::new(provider.clone()), ToolRegistry::new());

        let events = collect(conversation.reply(&[], "Any rust news?", MODEL, "")).await;

        assert!(events.contains(&TurnEvent::ToolActivity(
            "Searching the web for \"rust news\"…".to_string()
        )));
        let requests = provider.requests();
        let result = requests[1][2].content[0]
            .as_tool_response()
            .expect("tool result");
        assert!(result.content.contains("not available"), "{}", result.content);
        assert_eq!(outcome(&events).text, "Search isn't set up.");
    }

    #[tokio::test]
    async fn test_tool_failure_does_not_fail_turn() {
        let provider = MockProvider::new(vec![
            MockReply::tool_use("toolu_1", "get_weather", json!({"location": "Paris"})),
            MockReply::text(&["The weather service is down."]),
        ]);
        let registry = ToolRegistry::new().with_weather(Arc::new(BrokenWeather));
        let conversation = Conversation::new(Box::new(provider.clone()), registry);

        let events = collect(conversation.reply(&[], "Weather in Paris?", MODEL, "")).await;

        let requests = provider.requests();
        let result = requests[1][2].content[0].as_tool_response().unwrap();
        assert!(result.content.starts_with("Error: Service returned 401"));
        assert_eq!(outcome(&events).iterations, 2);
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_in_one_round() {
        let weather = Arc::new(RecordingWeather::default());
        let provider = MockProvider::new(vec![
            ScriptBuilder::new()
                .tool_use("toolu_a", "get_weather", &["{\"location\": \"Oslo\"}"])
                .tool_use("toolu_b", "get_datetime", &[])
                .tool_use("toolu_c", "get_weather", &["{\"location\": \"Atlantis\"}"])
                .stop("tool_use")
                .build(),
            MockReply::text(&["Done."]),
        ]);
        let registry = ToolRegistry::new().with_weather(weather);
        let conversation = Conversation::new(Box::new(provider.clone()), registry);

        let events = collect(conversation.reply(&[], "Oslo weather and time?", MODEL, "")).await;

        let labels: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                TurnEvent::ToolActivity(label) => Some(label.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                "Checking the weather…",
                "Checking the date and time…",
                "Checking the weather…"
            ]
        );

        let requests = provider.requests();
        let results: Vec<_> = requests[1][2]
            .content
            .iter()
            .filter_map(MessageContent::as_tool_response)
            .collect();
        let ids: Vec<_> = results.iter().map(|r| r.tool_use_id.as_str()).collect();
        assert_eq!(ids, vec!["toolu_a", "toolu_b", "toolu_c"]);
        assert_eq!(results[2].content, "Error: Could not find location 'Atlantis'");
        assert_eq!(outcome(&events).tool_calls_executed, 3);
    }

    #[tokio::test]
    async fn test_iterations_are_bounded() {
        let replies = (0..6)
            .map(|i| MockReply::tool_use(&format!("toolu_{i}"), "get_datetime", json!({})))
            .collect();
        let provider = MockProvider::new(replies);
        let conversation = Conversation::new(Box::new(provider.clone()), ToolRegistry::new());

        let events = collect(conversation.reply(&[], "What time is it?", MODEL, "")).await;

        assert_eq!(provider.call_count(), MAX_ITERATIONS);
        let outcome = outcome(&events);
        assert_eq!(outcome.iterations, MAX_ITERATIONS);
        assert_eq!(outcome.tool_calls_executed, MAX_ITERATIONS);
        assert_eq!(outcome.text, "");
    }

    #[tokio::test]
    async fn test_missing_stop_reason_ends_turn() {
        // message_delta carries usage but no stop reason
        let provider = MockProvider::new(vec![
            ScriptBuilder::new()
                .tool_use("toolu_1", "get_datetime", &["{}"])
                .raw(json!({"type": "message_delta", "delta": {}, "usage": {"output_tokens": 7}}))
                .build(),
            MockReply::text(&["unreachable"]),
        ]);
        let conversation = Conversation::new(Box::new(provider.clone()), ToolRegistry::new());

        let events = collect(conversation.reply(&[], "Time?", MODEL, "")).await;

        assert_eq!(provider.call_count(), 1);
        let outcome = outcome(&events);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.tool_calls_executed, 0);
        assert_eq!(outcome.usage, Usage::new(10, 7));
    }

    #[tokio::test]
    async fn test_tool_calls_with_other_stop_reason_still_run() {
        let provider = MockProvider::new(vec![
            ScriptBuilder::new()
                .tool_use("toolu_1", "get_datetime", &["{}"])
                .stop("max_tokens")
                .build(),
            MockReply::text(&["It's morning."]),
        ]);
        let conversation = Conversation::new(Box::new(provider.clone()), ToolRegistry::new());

        let events = collect(conversation.reply(&[], "Time?", MODEL, "")).await;

        assert_eq!(provider.call_count(), 2);
        assert_eq!(outcome(&events).tool_calls_executed, 1);
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let mut events = match ScriptBuilder::new().text(&["Partial ", "answer"]).build() {
            MockReply::Events(events) => events,
            MockReply::Error(_) => unreachable!(),
        };
        // Cut the stream after the second delta
        events.truncate(4);
        events.push(Err(TransportError::Stream("connection reset".to_string())));
        let provider = MockProvider::new(vec![MockReply::Events(events)]);
        let conversation = Conversation::new(Box::new(provider), ToolRegistry::new());

        let mut stream = conversation.reply(&[], "Tell me something", MODEL, "");
        let mut deltas = String::new();
        let error = loop {
            match stream.next().await {
                Some(Ok(TurnEvent::TextDelta(chunk))) => deltas.push_str(&chunk),
                Some(Ok(other)) => panic!("unexpected event {:?}", other),
                Some(Err(error)) => break error,
                None => panic!("stream ended without an error"),
            }
        };

        assert_eq!(deltas, "Partial answer");
        assert_eq!(error.partial_text(), "Partial answer");
        assert!(matches!(
            error,
            TurnError::Transport {
                source: TransportError::Stream(_),
                ..
            }
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_on_second_iteration_keeps_text() {
        let provider = MockProvider::new(vec![
            ScriptBuilder::new()
                .text(&["Checking. "])
                .tool_use("toolu_1", "get_datetime", &["{}"])
                .stop("tool_use")
                .build(),
            MockReply::Error(TransportError::Status {
                status: 529,
                body: "{\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\"}}".to_string(),
            }),
        ]);
        let conversation = Conversation::new(Box::new(provider), ToolRegistry::new());

        let result = conversation
            .run_turn(&[], "Time?", MODEL, "", |_| {}, |_| {})
            .await;

        let error = result.expect_err("second request fails");
        assert_eq!(error.partial_text(), "Checking. ");
        assert!(matches!(
            error,
            TurnError::Transport {
                source: TransportError::Status { status: 529, .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_run_turn_callbacks() {
        let provider = MockProvider::new(vec![
            ScriptBuilder::new()
                .usage(100, 20)
                .text(&["One moment."])
                .tool_use("toolu_1", "get_datetime", &["{}"])
                .stop("tool_use")
                .build(),
            ScriptBuilder::new()
                .usage(150, 30)
                .text(&[" It is ", "Friday."])
                .stop("end_turn")
                .build(),
        ]);
        let conversation = Conversation::new(Box::new(provider), ToolRegistry::new());

        let mut text = String::new();
        let mut activity = Vec::new();
        let (final_text, usage) = conversation
            .run_turn(
                &[],
                "What day is it?",
                MODEL,
                "",
                |chunk| text.push_str(chunk),
                |label| activity.push(label.to_string()),
            )
            .await
            .unwrap();

        assert_eq!(final_text, "One moment. It is Friday.");
        assert_eq!(text, final_text);
        assert_eq!(activity, vec!["Checking the date and time…"]);
        assert_eq!(usage, Usage::new(250, 50));
    }

    #[tokio::test]
    async fn test_outcome_history_entry() {
        let provider = MockProvider::new(vec![MockReply::text(&["Hi!"])]);
        let conversation = Conversation::new(Box::new(provider), ToolRegistry::new());

        let events = collect(conversation.reply(&[], "Hello", MODEL, "")).await;

        assert_eq!(
            outcome(&events).history_entry(),
            HistoryEntry::assistant("Hi!")
        );
    }

    #[tokio::test]
    async fn test_unknown_model_has_no_cost() {
        let provider = MockProvider::new(vec![MockReply::text(&["Hi!"])]);
        let conversation = Conversation::new(Box::new(provider), ToolRegistry::new());

        let events = collect(conversation.reply(&[], "Hello", "local-model", "")).await;

        assert_eq!(outcome(&events).cost_usd, None);
    }
}
