//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation state and drives
//! one streamed request at a time through the request state machine:
//!
//! ```text
//! Idle -> Sending -> Streaming -> { Completed | EmptyResponse | Failed | Interrupted } -> Idle
//! ```

use std::future::Future;
use std::path::Path;
use std::pin::pin;
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::assembler::RequestAssembler;
use crate::chat::config::ChatConfig;
use crate::client::ChatBackend;
use crate::error::{Error, Result};
use crate::observability::{
    CHAT_COMPLETED, CHAT_EMPTY_RESPONSES, CHAT_FAILURES, CHAT_INTERRUPTS, STREAM_DURATION,
    STREAM_FIRST_DELTA,
};
use crate::render::Renderer;
use crate::session::Session;
use crate::types::{Attachment, Category, Model, ModelCatalog, Role, Turn};

/// How often a pending network wait checks the renderer's interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Where the in-flight request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// No request in flight.
    Idle,
    /// Request sent; waiting for the response to start.
    Sending,
    /// Deltas are arriving.
    Streaming {
        /// Deltas received so far.
        deltas: usize,
    },
}

/// How a submission ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The response streamed fully and was stored as an assistant turn.
    Completed {
        /// The full response text.
        text: String,
    },
    /// The stream ended without any text; carries an [`Error::EmptyResponse`].
    EmptyResponse(Error),
    /// A transport or protocol error ended the request.
    Failed(Error),
    /// The user interrupted the request; carries an [`Error::Abort`].
    Interrupted(Error),
}

impl TurnOutcome {
    /// Returns true if an assistant turn was stored.
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }

    /// The response text, when completed.
    pub fn text(&self) -> Option<&str> {
        match self {
            TurnOutcome::Completed { text } => Some(text),
            _ => None,
        }
    }

    /// The error behind this outcome, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            TurnOutcome::Completed { .. } => None,
            TurnOutcome::EmptyResponse(err)
            | TurnOutcome::Failed(err)
            | TurnOutcome::Interrupted(err) => Some(err),
        }
    }
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The model used for the next request.
    pub model: Model,
    /// The ticket category used for the next request.
    pub category: Category,
    /// The number of turns in the conversation.
    pub turn_count: usize,
    /// User turns in the conversation.
    pub user_turns: usize,
    /// Assistant turns in the conversation.
    pub assistant_turns: usize,
    /// Turns of history replayed per request.
    pub context_turns: usize,
    /// Requests opened in this session.
    pub total_requests: u64,
    /// Requests that produced an assistant turn.
    pub completed: u64,
    /// Requests whose stream carried no text.
    pub empty_responses: u64,
    /// Requests that ended in an error.
    pub failures: u64,
    /// Requests interrupted by the user.
    pub interrupts: u64,
    /// Wall time of the last completed response.
    pub last_response_time: Option<Duration>,
    /// Name of the pending attachment, if any.
    pub pending_attachment: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    requests: u64,
    completed: u64,
    empty_responses: u64,
    failures: u64,
    interrupts: u64,
}

/// A chat session that manages conversation state and API interactions.
///
/// Owns the [`Session`] history; the history is only mutated between requests.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    config: ChatConfig,
    session: Session,
    assembler: RequestAssembler,
    attachment: Option<Attachment>,
    state: RequestState,
    counters: Counters,
    last_response_time: Option<Duration>,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Creates a new chat session with the given backend and configuration.
    pub fn new(backend: B, config: ChatConfig) -> Self {
        let assembler = RequestAssembler::new(config.context_turns);
        Self {
            backend,
            config,
            session: Session::new(),
            assembler,
            attachment: None,
            state: RequestState::Idle,
            counters: Counters::default(),
            last_response_time: None,
        }
    }

    /// Submits user text and streams the response.
    ///
    /// This method:
    /// 1. Adds the user turn to history and consumes any pending attachment
    /// 2. Sends a streaming request to the backend
    /// 3. Renders deltas as they arrive
    /// 4. Adds the complete response as an assistant turn
    ///
    /// Failures are rendered and returned as outcomes; only a completed response adds an
    /// assistant turn. The user turn stays in history whatever the outcome.
    pub async fn submit(&mut self, text: &str, renderer: &mut dyn Renderer) -> TurnOutcome {
        let prompt = text.trim();
        if prompt.is_empty() {
            return TurnOutcome::Failed(Error::validation("prompt is empty", None));
        }

        let attachment = self.attachment.take();
        self.session.append(Turn::user(prompt));
        let messages = self.assembler.assemble(
            &self.session,
            self.config.category,
            prompt,
            attachment.as_ref(),
        );
        tracing::debug!(
            model = %self.config.model,
            category = %self.config.category,
            payload = messages.len(),
            image = attachment.is_some(),
            "submitting ticket message"
        );

        self.counters.requests += 1;
        self.transition(RequestState::Sending);
        renderer.print_placeholder();
        let start = Instant::now();

        let outcome = self.stream_response(messages, start, renderer).await;
        self.transition(RequestState::Idle);

        match &outcome {
            TurnOutcome::Completed { text } => {
                CHAT_COMPLETED.click();
                self.counters.completed += 1;
                self.last_response_time = Some(start.elapsed());
                STREAM_DURATION.add(start.elapsed().as_secs_f64());
                self.session.append(Turn::assistant(text.clone()));
                renderer.finish_response();
            }
            TurnOutcome::EmptyResponse(err) => {
                CHAT_EMPTY_RESPONSES.click();
                self.counters.empty_responses += 1;
                tracing::warn!(error = %err, "no text in response");
                renderer.clear_placeholder();
                renderer.print_warning(
                    "⚠️ The AI returned an empty response. Please switch models with /model!",
                );
            }
            TurnOutcome::Failed(err) => {
                CHAT_FAILURES.click();
                self.counters.failures += 1;
                tracing::warn!(model = %self.config.model, error = %err, "request failed");
                renderer.clear_placeholder();
                renderer.print_error(&format!("⚠️ Connection Error: {err}"));
            }
            TurnOutcome::Interrupted(err) => {
                CHAT_INTERRUPTS.click();
                self.counters.interrupts += 1;
                tracing::debug!(error = %err, "request interrupted");
                renderer.print_interrupted();
            }
        }
        outcome
    }

    async fn stream_response(
        &mut self,
        messages: Vec<crate::types::ChatMessage>,
        start: Instant,
        renderer: &mut dyn Renderer,
    ) -> TurnOutcome {
        let opened = interruptible(
            self.backend.stream_text(&self.config.model, messages),
            renderer,
        )
        .await;
        let mut stream = match opened {
            Some(Ok(stream)) => stream,
            Some(Err(err)) => return TurnOutcome::Failed(err),
            None => return interrupted(),
        };

        let mut text = String::new();
        let mut deltas = 0;
        self.transition(RequestState::Streaming { deltas });
        loop {
            if renderer.should_interrupt() {
                return interrupted();
            }
            let next = match interruptible(stream.next(), renderer).await {
                Some(next) => next,
                None => return interrupted(),
            };
            match next {
                Some(Ok(delta)) => {
                    if delta.is_empty() {
                        continue;
                    }
                    if deltas == 0 {
                        STREAM_FIRST_DELTA.add(start.elapsed().as_secs_f64());
                        renderer.clear_placeholder();
                    }
                    deltas += 1;
                    self.state = RequestState::Streaming { deltas };
                    renderer.print_text(&delta);
                    text.push_str(&delta);
                }
                Some(Err(err)) => return TurnOutcome::Failed(err),
                None => break,
            }
        }

        if text.is_empty() {
            TurnOutcome::EmptyResponse(Error::empty_response(self.config.model.as_str()))
        } else {
            TurnOutcome::Completed { text }
        }
    }

    fn transition(&mut self, next: RequestState) {
        tracing::trace!(from = ?self.state, to = ?next, "request state");
        self.state = next;
    }

    /// The current request state; `Idle` whenever no submission is running.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// The conversation history.
    pub fn history(&self) -> &[Turn] {
        self.session.turns()
    }

    /// Returns the number of turns in the conversation.
    pub fn turn_count(&self) -> usize {
        self.session.len()
    }

    /// Discards the conversation and any pending attachment.
    pub fn new_session(&mut self) {
        self.session = Session::new();
        self.attachment = None;
    }

    /// Returns the current model.
    pub fn model(&self) -> &Model {
        &self.config.model
    }

    /// Changes the model used for responses.
    pub fn set_model(&mut self, model: Model) {
        self.config.model = model;
    }

    /// Selects a model by catalog index or identifier.
    pub fn select_model(&mut self, selection: &str) -> Result<&Model> {
        let model = self.config.catalog.resolve(selection).ok_or_else(|| {
            Error::validation(
                format!("no model matches {selection:?}"),
                Some("model".to_string()),
            )
        })?;
        self.config.model = model;
        Ok(&self.config.model)
    }

    /// The models offered for selection.
    pub fn catalog(&self) -> &ModelCatalog {
        &self.config.catalog
    }

    /// Returns the current ticket category.
    pub fn category(&self) -> Category {
        self.config.category
    }

    /// Changes the ticket category, returning its advisory if it has one.
    ///
    /// Only the system instruction of later requests changes; history is untouched.
    pub fn set_category(&mut self, category: Category) -> Option<&'static str> {
        self.config.category = category;
        category.advisory()
    }

    /// Selects a category by name, alias, or 1-based index.
    pub fn select_category(&mut self, selection: &str) -> Result<Category> {
        let category: Category = selection
            .parse()
            .map_err(|e: String| Error::validation(e, Some("category".to_string())))?;
        self.set_category(category);
        Ok(category)
    }

    /// Loads an image to send with the next submission.
    ///
    /// On error the pending attachment is left unchanged.
    pub fn attach(&mut self, path: impl AsRef<Path>) -> Result<&Attachment> {
        let attachment = Attachment::from_path(path)?;
        Ok(self.attachment.insert(attachment))
    }

    /// Sets the attachment for the next submission directly.
    pub fn set_attachment(&mut self, attachment: Option<Attachment>) {
        self.attachment = attachment;
    }

    /// Drops the pending attachment, returning it.
    pub fn detach(&mut self) -> Option<Attachment> {
        self.attachment.take()
    }

    /// The attachment that will be sent with the next submission.
    pub fn pending_attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// The active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.config.model.clone(),
            category: self.config.category,
            turn_count: self.session.len(),
            user_turns: self.session.count_role(Role::User),
            assistant_turns: self.session.count_role(Role::Assistant),
            context_turns: self.assembler.context_turns(),
            total_requests: self.counters.requests,
            completed: self.counters.completed,
            empty_responses: self.counters.empty_responses,
            failures: self.counters.failures,
            interrupts: self.counters.interrupts,
            last_response_time: self.last_response_time,
            pending_attachment: self
                .attachment
                .as_ref()
                .map(|a| a.display_name().to_string()),
        }
    }
}

/// Await `fut`, giving up with `None` once the renderer asks to interrupt.
fn interrupted() -> TurnOutcome {
    TurnOutcome::Interrupted(Error::abort("interrupted by user"))
}

async fn interruptible<F: Future>(fut: F, renderer: &dyn Renderer) -> Option<F::Output> {
    let mut fut = pin!(fut);
    loop {
        tokio::select! {
            output = &mut fut => return Some(output),
            _ = tokio::time::sleep(INTERRUPT_POLL) => {
                if renderer.should_interrupt() {
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TextStream;
    use crate::types::ChatMessage;
    use futures::stream;

    struct Echo;

    #[async_trait::async_trait]
    impl ChatBackend for Echo {
        async fn stream_text(&self, _: &Model, messages: Vec<ChatMessage>) -> Result<TextStream> {
            let last = messages
                .last()
                .map(|m| m.content.as_text())
                .unwrap_or_default();
            Ok(Box::pin(stream::iter(vec![Ok(format!("echo: {last}"))])))
        }
    }

    #[derive(Default)]
    struct Quiet;

    impl Renderer for Quiet {
        fn print_placeholder(&mut self) {}
        fn clear_placeholder(&mut self) {}
        fn print_text(&mut self, _: &str) {}
        fn print_warning(&mut self, _: &str) {}
        fn print_error(&mut self, _: &str) {}
        fn print_info(&mut self, _: &str) {}
        fn finish_response(&mut self) {}
    }

    #[tokio::test]
    async fn new_session_empty() {
        let session = ChatSession::new(Echo, ChatConfig::default());
        assert_eq!(session.turn_count(), 0);
        assert_eq!(session.state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn submit_appends_exchange() {
        let mut session = ChatSession::new(Echo, ChatConfig::default());
        let outcome = session.submit("disk is clicking", &mut Quiet).await;
        assert_eq!(outcome.text(), Some("echo: disk is clicking"));
        assert_eq!(session.turn_count(), 2);
        assert_eq!(session.history()[1].role, Role::Assistant);
        assert_eq!(session.state(), RequestState::Idle);
        assert_eq!(session.stats().completed, 1);
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let mut session = ChatSession::new(Echo, ChatConfig::default());
        let outcome = session.submit("   ", &mut Quiet).await;
        assert!(outcome.error().is_some_and(Error::is_validation));
        assert_eq!(session.turn_count(), 0);
        assert_eq!(session.stats().total_requests, 0);
    }

    #[tokio::test]
    async fn new_session_clears_history() {
        let mut session = ChatSession::new(Echo, ChatConfig::default());
        session.submit("hello", &mut Quiet).await;
        session.set_attachment(Some(Attachment::from_bytes(
            vec![1],
            crate::types::ImageMediaType::Png,
        )));
        session.new_session();
        assert_eq!(session.turn_count(), 0);
        assert!(session.pending_attachment().is_none());
    }

    #[test]
    fn select_model_and_category() {
        let mut session = ChatSession::new(Echo, ChatConfig::default());
        assert_eq!(
            session.select_model("2").unwrap().as_str(),
            "meta-llama/llama-3.2-11b-vision-instruct:free"
        );
        assert!(session.select_model("7").unwrap_err().is_validation());
        assert_eq!(session.select_model("acme/vision-1").unwrap().as_str(), "acme/vision-1");

        assert_eq!(session.category(), Category::HardwareFailure);
        assert!(session.set_category(Category::SecurityAlert).is_some());
        assert!(session.set_category(Category::Other).is_none());
        assert_eq!(session.select_category("billing").unwrap(), Category::BillingAccount);
        assert!(session.select_category("plumbing").unwrap_err().is_validation());
        assert_eq!(session.category(), Category::BillingAccount);
    }

    #[test]
    fn failed_attach_keeps_pending() {
        let mut session = ChatSession::new(Echo, ChatConfig::default());
        let pending = Attachment::from_bytes(vec![1, 2, 3], crate::types::ImageMediaType::Gif);
        session.set_attachment(Some(pending.clone()));
        assert!(session.attach("/nonexistent/screenshot.png").is_err());
        assert!(session.attach("notes.txt").is_err());
        assert_eq!(session.pending_attachment(), Some(&pending));
        assert_eq!(session.detach(), Some(pending));
        assert!(session.pending_attachment().is_none());
    }
}
