//! Integration tests for the supportintel library.
//!
//! Most tests drive `ChatSession` through a scripted in-memory backend. The live test requires
//! an API key in the environment to run.

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use futures::stream;
    use tokio_test::{assert_err, assert_ok};

    use supportintel::chat::{ChatConfig, ChatSession, Renderer, TurnOutcome};
    use supportintel::{
        Attachment, Category, ChatBackend, ChatMessage, ContentPart, Error, ImageMediaType,
        Model, OpenRouter, Result, Role, TextStream, TurnContent,
    };

    enum Script {
        Deltas(Vec<Result<String>>),
        Refuse(Error),
        Hang,
    }

    #[derive(Clone, Default)]
    struct ScriptedBackend {
        scripts: Arc<Mutex<VecDeque<Script>>>,
        requests: Arc<Mutex<Vec<(Model, Vec<ChatMessage>)>>>,
    }

    impl ScriptedBackend {
        fn push(&self, script: Script) -> &Self {
            self.scripts.lock().unwrap().push_back(script);
            self
        }

        fn reply(&self, deltas: &[&str]) -> &Self {
            self.push(Script::Deltas(
                deltas.iter().map(|d| Ok(d.to_string())).collect(),
            ))
        }

        fn requests(&self) -> Vec<(Model, Vec<ChatMessage>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn stream_text(
            &self,
            model: &Model,
            messages: Vec<ChatMessage>,
        ) -> Result<TextStream> {
            self.requests
                .lock()
                .unwrap()
                .push((model.clone(), messages));
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Deltas(Vec::new()));
            match script {
                Script::Deltas(items) => Ok(Box::pin(stream::iter(items))),
                Script::Refuse(err) => Err(err),
                Script::Hang => futures::future::pending().await,
            }
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        placeholders: usize,
        text: String,
        warnings: Vec<String>,
        errors: Vec<String>,
        interrupted: bool,
        interrupt_after_text: bool,
        interrupt_requested: bool,
    }

    impl Renderer for RecordingRenderer {
        fn print_placeholder(&mut self) {
            self.placeholders += 1;
        }

        fn clear_placeholder(&mut self) {}

        fn print_text(&mut self, text: &str) {
            self.text.push_str(text);
            if self.interrupt_after_text {
                self.interrupt_requested = true;
            }
        }

        fn print_warning(&mut self, warning: &str) {
            self.warnings.push(warning.to_string());
        }

        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }

        fn print_info(&mut self, _: &str) {}

        fn finish_response(&mut self) {}

        fn print_interrupted(&mut self) {
            self.interrupted = true;
        }

        fn should_interrupt(&self) -> bool {
            self.interrupt_requested
        }
    }

    fn session(backend: &ScriptedBackend) -> ChatSession<ScriptedBackend> {
        ChatSession::new(backend.clone(), ChatConfig::default())
    }

    #[tokio::test]
    async fn successful_submissions_alternate_roles() {
        let backend = ScriptedBackend::default();
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer::default();
        let prompts = ["fan is grinding", "it is a ThinkPad T14", "thanks"];
        for (i, prompt) in prompts.iter().enumerate() {
            backend.reply(&["answer ", i.to_string().as_str()]);
            let outcome = chat.submit(prompt, &mut renderer).await;
            assert!(outcome.is_completed());
        }

        let history = chat.history();
        assert_eq!(history.len(), 2 * prompts.len());
        for (i, pair) in history.chunks(2).enumerate() {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[0].content.as_text(), prompts[i]);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].content.as_text(), format!("answer {i}"));
        }
        assert_eq!(renderer.placeholders, prompts.len());
    }

    #[tokio::test]
    async fn deltas_accumulate_into_one_turn() {
        let backend = ScriptedBackend::default();
        backend.reply(&["Hel", "lo", " world"]);
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer::default();

        let outcome = chat.submit("ping", &mut renderer).await;
        assert_eq!(outcome.text(), Some("Hello world"));
        assert_eq!(renderer.text, "Hello world");
        assert_eq!(chat.history().len(), 2);
        let last = chat.history().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, TurnContent::Text("Hello world".to_string()));
    }

    #[tokio::test]
    async fn empty_stream_surfaces_empty_response() {
        let backend = ScriptedBackend::default();
        backend.reply(&[]);
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer::default();

        let outcome = chat.submit("anyone there?", &mut renderer).await;
        assert!(matches!(outcome, TurnOutcome::EmptyResponse(_)));
        let err = outcome.error().unwrap();
        assert!(err.is_empty_response());
        assert!(err.is_recoverable());
        assert!(err.to_string().contains(chat.model().as_str()));
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.history()[0].role, Role::User);
        assert_eq!(renderer.warnings.len(), 1);
        assert!(renderer.warnings[0].contains("empty response"));
        assert_eq!(chat.stats().empty_responses, 1);
    }

    #[tokio::test]
    async fn empty_deltas_count_as_empty_response() {
        let backend = ScriptedBackend::default();
        backend.reply(&["", ""]);
        let mut chat = session(&backend);
        let outcome = chat
            .submit("hello", &mut RecordingRenderer::default())
            .await;
        assert!(matches!(outcome, TurnOutcome::EmptyResponse(Error::EmptyResponse { .. })));
        assert_eq!(chat.history().len(), 1);
    }

    #[tokio::test]
    async fn transport_error_appends_no_assistant_turn() {
        let backend = ScriptedBackend::default();
        backend.push(Script::Deltas(vec![
            Ok("Try reseating the".to_string()),
            Err(Error::streaming("connection reset by peer", None)),
        ]));
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer::default();

        let outcome = chat.submit("monitor flickers", &mut renderer).await;
        assert!(matches!(outcome, TurnOutcome::Failed(Error::Streaming { .. })));
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.history()[0].role, Role::User);
        assert_eq!(renderer.errors.len(), 1);
        assert!(renderer.errors[0].starts_with("⚠️ Connection Error: "));
        assert!(renderer.errors[0].contains("connection reset by peer"));
    }

    #[tokio::test]
    async fn refused_request_is_recoverable() {
        let backend = ScriptedBackend::default();
        backend.push(Script::Refuse(Error::rate_limit("slow down", Some(5))));
        backend.reply(&["ok"]);
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer::default();

        let first = chat.submit("first", &mut renderer).await;
        assert!(first.error().is_some_and(Error::is_rate_limit));
        let second = chat.submit("second", &mut renderer).await;
        assert!(second.is_completed());

        let roles: Vec<Role> = chat.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::User, Role::Assistant]);
        let stats = chat.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total_requests, 2);
    }

    #[tokio::test]
    async fn interrupt_discards_partial_text() {
        let backend = ScriptedBackend::default();
        backend.reply(&["partial ", "never shown"]);
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer {
            interrupt_after_text: true,
            ..RecordingRenderer::default()
        };

        let outcome = chat.submit("long answer please", &mut renderer).await;
        assert!(matches!(outcome, TurnOutcome::Interrupted(_)));
        assert!(outcome.error().is_some_and(Error::is_abort));
        assert!(renderer.interrupted);
        assert_eq!(renderer.text, "partial ");
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.stats().interrupts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_while_waiting_for_response() {
        let backend = ScriptedBackend::default();
        backend.push(Script::Hang);
        backend.reply(&["back online"]);
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer {
            interrupt_requested: true,
            ..RecordingRenderer::default()
        };

        let outcome = chat.submit("is the VPN down?", &mut renderer).await;
        assert!(matches!(outcome, TurnOutcome::Interrupted(Error::Abort { .. })));
        assert!(renderer.interrupted);
        assert_eq!(renderer.placeholders, 1);
        assert!(renderer.text.is_empty());
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.history()[0].role, Role::User);
        assert_eq!(chat.stats().interrupts, 1);

        renderer.interrupt_requested = false;
        renderer.interrupted = false;
        let next = chat.submit("still there?", &mut renderer).await;
        assert_eq!(next.text(), Some("back online"));
        assert_eq!(chat.history().len(), 3);
    }

    #[tokio::test]
    async fn payload_has_single_leading_system_entry() {
        let backend = ScriptedBackend::default();
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer::default();
        for i in 0..5 {
            backend.reply(&["reply"]);
            chat.submit(&format!("message {i}"), &mut renderer).await;
        }

        for (_, messages) in backend.requests() {
            assert_eq!(messages[0].role, Role::System);
            assert_eq!(
                messages.iter().filter(|m| m.role == Role::System).count(),
                1
            );
            assert!(messages.len() <= 1 + 4);
            assert_eq!(messages.last().unwrap().role, Role::User);
        }
        let (_, last) = backend.requests().pop().unwrap();
        assert_eq!(last.last().unwrap().content.as_text(), "message 4");
    }

    #[tokio::test]
    async fn category_switch_only_changes_system_text() {
        let backend = ScriptedBackend::default();
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer::default();

        backend.reply(&["first reply"]);
        chat.submit("card was charged twice", &mut renderer).await;
        let advisory = chat.set_category(Category::BillingAccount);
        assert!(advisory.is_some_and(|a| a.contains("FINANCE MODE")));
        backend.reply(&["second reply"]);
        chat.submit("any update?", &mut renderer).await;

        let requests = backend.requests();
        let first_system = requests[0].1[0].content.as_text();
        let second_system = requests[1].1[0].content.as_text();
        assert!(first_system.contains("CURRENT TICKET CATEGORY: Hardware Failure"));
        assert!(second_system.contains("CURRENT TICKET CATEGORY: Billing & Account"));
        assert_eq!(requests[1].1.len(), 4);
        assert_eq!(chat.history().len(), 4);
        assert!(chat.history().iter().all(|t| t.role != Role::System));
    }

    #[tokio::test]
    async fn attachment_goes_out_once_and_is_not_stored() {
        let backend = ScriptedBackend::default();
        let mut chat = session(&backend);
        let mut renderer = RecordingRenderer::default();
        chat.set_attachment(Some(Attachment::from_bytes(
            vec![0x89, b'P', b'N', b'G'],
            ImageMediaType::Png,
        )));

        backend.reply(&["I can see the error dialog."]);
        chat.submit("T", &mut renderer).await;
        backend.reply(&["Follow-up."]);
        chat.submit("and now?", &mut renderer).await;

        let requests = backend.requests();
        let first = requests[0].1.last().unwrap();
        assert_eq!(first.role, Role::User);
        let TurnContent::Parts(parts) = &first.content else {
            panic!("expected structured content");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], ContentPart::text("T"));
        let ContentPart::ImageUrl { image_url } = &parts[1] else {
            panic!("expected image part");
        };
        assert!(image_url.url.starts_with("data:image/png;base64,"));
        assert_eq!(
            requests[0]
                .1
                .iter()
                .filter(|m| m.role == Role::User)
                .count(),
            1
        );

        let second = &requests[1].1;
        assert!(second.iter().all(|m| m.content.image_count() == 0));
        assert!(chat.history().iter().all(|t| t.content.image_count() == 0));
        assert_eq!(chat.history()[0].content.as_text(), "T");
        assert!(chat.pending_attachment().is_none());
    }

    #[tokio::test]
    async fn default_model_is_first_catalog_entry() {
        let backend = ScriptedBackend::default();
        backend.reply(&["ok"]);
        let config = ChatConfig::default().with_catalog(supportintel::ModelCatalog::new([
            "m1", "m2", "m3",
        ]));
        let mut chat = ChatSession::new(backend.clone(), config);
        chat.submit("hi", &mut RecordingRenderer::default()).await;
        assert_eq!(backend.requests()[0].0, Model::new("m1"));

        assert_ok!(chat.select_model("3"));
        assert_err!(chat.select_model("4"));
        backend.reply(&["ok"]);
        chat.submit("again", &mut RecordingRenderer::default()).await;
        assert_eq!(backend.requests()[1].0, Model::new("m3"));
    }

    #[tokio::test]
    async fn new_session_starts_empty() {
        let backend = ScriptedBackend::default();
        backend.reply(&["one"]);
        let mut chat = session(&backend);
        chat.submit("first", &mut RecordingRenderer::default()).await;
        chat.new_session();
        assert!(chat.history().is_empty());

        backend.reply(&["two"]);
        chat.submit("second", &mut RecordingRenderer::default()).await;
        let (_, messages) = backend.requests().pop().unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_streaming_response() {
        // This test requires OPENROUTER_API_KEY to be set
        let api_key = std::env::var("OPENROUTER_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("Skipping test: OPENROUTER_API_KEY not set");
            return;
        }

        let client = OpenRouter::new(api_key).expect("Failed to create client");
        let mut chat = ChatSession::new(client, ChatConfig::default().without_color());
        let outcome = chat
            .submit(
                "Reply with one short sentence about restarting a router.",
                &mut RecordingRenderer::default(),
            )
            .await;
        assert!(
            !matches!(outcome, TurnOutcome::Interrupted(_)),
            "Live request should not be interrupted"
        );
    }
}
