//! End-to-end turns through `ChatAgent` and the terminal front end, driven by
//! a scripted provider.

mod common;

use common::{ ScriptedClient, Step };

use darsenizami_chat::agent::{ ChatAgent, TurnEvent };
use darsenizami_chat::cli::repl::Repl;
use darsenizami_chat::config::prompt::{ ERROR_APOLOGY, GREETING };
use darsenizami_chat::models::chat::Role;
use darsenizami_chat::session::{ ChatSession, TurnOutcome };

mod streaming_tests {
    use super::*;

    #[tokio::test]
    async fn test_sarf_question_streams_into_placeholder() {
        let client = ScriptedClient::streaming(
            vec![
                Step::Text("Ilm-us-Sarf "),
                Step::Text("is the science "),
                Step::Text("of morphology.")
            ]
        );
        let agent = ChatAgent::with_client(client.clone());
        let mut session = ChatSession::new();

        let mut observed = Vec::new();
        let outcome = agent.submit(&mut session, "What is Ilm-us-Sarf?", |event| {
            if let TurnEvent::Delta { message, .. } = event {
                observed.push(message.content.clone());
            }
        }).await;

        assert_eq!(observed, vec![
            "Ilm-us-Sarf ",
            "Ilm-us-Sarf is the science ",
            "Ilm-us-Sarf is the science of morphology."
        ]);
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "What is Ilm-us-Sarf?");
        assert_eq!(messages[2].content, "Ilm-us-Sarf is the science of morphology.");
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_history_sent_is_everything_before_the_turn() {
        let client = ScriptedClient::streaming(vec![Step::Text("ok")]);
        let agent = ChatAgent::with_client(client.clone());
        let mut session = ChatSession::new();

        agent.submit(&mut session, "first", |_| {}).await;
        agent.submit(&mut session, "second", |_| {}).await;

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "first");
        assert_eq!(calls[0].1.len(), 1);
        assert_eq!(calls[0].1[0].parts[0].text, GREETING);

        assert_eq!(calls[1].0, "second");
        let texts: Vec<&str> = calls[1].1
            .iter()
            .map(|item| item.parts[0].text.as_str())
            .collect();
        assert_eq!(texts, vec![GREETING, "first", "ok"]);
    }

    #[tokio::test]
    async fn test_empty_chunks_are_skipped_and_zero_chunks_leave_blank_reply() {
        let client = ScriptedClient::streaming(vec![Step::Text(""), Step::Text("")]);
        let agent = ChatAgent::with_client(client);
        let mut session = ChatSession::new();

        let mut deltas = 0;
        let outcome = agent.submit(&mut session, "Hello", |event| {
            if let TurnEvent::Delta { .. } = event {
                deltas += 1;
            }
        }).await;

        assert_eq!(deltas, 0);
        assert!(matches!(outcome, TurnOutcome::Completed { ref content, .. } if content.is_empty()));
        assert_eq!(session.conversation().last().unwrap().content, "");
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_provider() {
        let client = ScriptedClient::streaming(vec![Step::Text("x")]);
        let agent = ChatAgent::with_client(client.clone());
        let mut session = ChatSession::new();

        let outcome = agent.submit(&mut session, "   \n ", |_| {}).await;

        assert_eq!(outcome, TurnOutcome::Rejected);
        assert_eq!(session.conversation().len(), 1);
        assert!(!session.is_loading());
        assert!(client.calls().is_empty());
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_mid_stream_failure_replaces_partial_text() {
        let client = ScriptedClient::streaming(vec![Step::Text("Partial"), Step::Fail("reset")]);
        let agent = ChatAgent::with_client(client);
        let mut session = ChatSession::new();

        let outcome = agent.submit(&mut session, "Explain Hidaya", |_| {}).await;

        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(session.conversation().last().unwrap().content, ERROR_APOLOGY);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_failure_to_open_stream_uses_apology() {
        let agent = ChatAgent::with_client(ScriptedClient::refusing());
        let mut session = ChatSession::new();

        agent.submit(&mut session, "Salaam", |_| {}).await;

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content, ERROR_APOLOGY);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_user_can_resubmit_after_failure() {
        let agent = ChatAgent::with_client(ScriptedClient::refusing());
        let mut session = ChatSession::new();

        agent.submit(&mut session, "one", |_| {}).await;
        let outcome = agent.submit(&mut session, "two", |_| {}).await;

        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(session.conversation().len(), 5);
    }
}

mod non_streaming_tests {
    use super::*;

    #[tokio::test]
    async fn test_single_response_fills_placeholder() {
        let client = ScriptedClient::replying("Quduri is a primer of Hanafi fiqh.");
        let agent = ChatAgent::with_client(client.clone());
        let mut session = ChatSession::new();

        let outcome = agent.submit_without_streaming(&mut session, "What is Quduri?", |_| {}).await;

        assert!(matches!(
            outcome,
            TurnOutcome::Completed { ref content, .. } if content == "Quduri is a primer of Hanafi fiqh."
        ));
        assert_eq!(client.calls()[0].0, "What is Quduri?");
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_single_response_failure_uses_apology() {
        let agent = ChatAgent::with_client(ScriptedClient::streaming(vec![]));
        let mut session = ChatSession::new();

        agent.submit_without_streaming(&mut session, "What is Quduri?", |_| {}).await;

        assert_eq!(session.conversation().last().unwrap().content, ERROR_APOLOGY);
    }
}

mod repl_tests {
    use super::*;

    async fn run_repl(client: std::sync::Arc<ScriptedClient>, script: &str) -> (String, usize) {
        let agent = ChatAgent::with_client(client);
        let mut repl = Repl::new(agent, script.as_bytes(), Vec::new());
        repl.run().await.expect("repl failed");
        let len = repl.session().conversation().len();
        let output = String::from_utf8(repl.into_output()).expect("utf8 output");
        (output, len)
    }

    #[tokio::test]
    async fn test_repl_prints_streamed_reply() {
        let client = ScriptedClient::streaming(vec![Step::Text("Nahw "), Step::Text("is syntax.")]);
        let (output, len) = run_repl(client, "What is Nahw?\n/quit\n").await;

        assert!(output.contains(GREETING));
        assert!(output.contains("Assistant: Nahw is syntax."));
        assert_eq!(len, 3);
    }

    #[tokio::test]
    async fn test_repl_clear_requires_confirmation() {
        let client = ScriptedClient::streaming(vec![Step::Text("ok")]);
        let (_, kept) = run_repl(client.clone(), "hi\n/clear\nn\n").await;
        assert_eq!(kept, 3);

        let (output, cleared) = run_repl(client, "hi\n/clear\ny\n").await;
        assert_eq!(cleared, 1);
        assert!(output.contains("Are you sure you want to clear the chat history?"));
    }

    #[tokio::test]
    async fn test_repl_joins_continued_lines() {
        let client = ScriptedClient::streaming(vec![Step::Text("ok")]);
        run_repl(client.clone(), "line one\\\nline two\n").await;

        assert_eq!(client.calls()[0].0, "line one\nline two");
    }

    #[tokio::test]
    async fn test_repl_ignores_blank_lines_and_shows_failures() {
        let (output, len) = run_repl(ScriptedClient::refusing(), "\n   \nSalaam\n").await;

        assert_eq!(len, 3);
        assert!(output.contains(ERROR_APOLOGY));
        assert!(!output.contains("[partial reply discarded]"));
    }

    #[tokio::test]
    async fn test_repl_marks_partial_reply_as_discarded() {
        let client = ScriptedClient::streaming(vec![Step::Text("Partial"), Step::Fail("boom")]);
        let agent = ChatAgent::with_client(client);
        let mut repl = Repl::new(agent, "Explain Mirqat\n/history\n".as_bytes(), Vec::new());
        repl.run().await.expect("repl failed");

        assert_eq!(repl.session().conversation().last().unwrap().content, ERROR_APOLOGY);
        let output = String::from_utf8(repl.into_output()).expect("utf8 output");
        let shown = output.find("Partial").expect("partial text shown");
        let note = output.find("[partial reply discarded]").expect("discard note");
        let apology = output[note..].find(ERROR_APOLOGY).map(|i| i + note);
        assert!(shown < note);
        assert!(apology.is_some());

        let history = &output[apology.unwrap() + ERROR_APOLOGY.len()..];
        assert!(!history.contains("Partial"));
        assert!(history.contains(ERROR_APOLOGY));
    }
}
