use std::sync::Arc;
use std::time::Duration;

use pagechat::chat::{ChatRequest, ChatSession, FAILED_REPLY, Role, SendOutcome};
use pagechat::source::DocumentReference;
use pagechat::test_utils::test_helpers::*;

fn reference() -> DocumentReference {
    DocumentReference::new("https://files.example/report.pdf?dl=1").unwrap()
}

fn settle(chat: &mut ChatSession) {
    assert!(pump_chat(chat, |c| !c.is_awaiting_reply()));
}

#[test]
fn blank_messages_never_reach_the_backend() {
    let backend = Arc::new(FakeChatBackend::replying(["unused"]));
    let mut chat = ChatSession::new(backend.clone());

    assert_eq!(chat.send("", &reference(), 1), SendOutcome::Ignored);
    assert_eq!(chat.send("   \n\t", &reference(), 1), SendOutcome::Ignored);

    chat.set_input("    ");
    assert_eq!(chat.submit(&reference(), 1), SendOutcome::Ignored);

    assert!(chat.transcript().is_empty());
    assert!(!chat.is_awaiting_reply());
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(backend.call_count(), 0);
}

#[test]
fn successful_turn_appends_user_and_assistant() {
    let backend = Arc::new(FakeChatBackend::replying(["It lists quarterly revenue."]));
    let mut chat = ChatSession::new(backend.clone());

    let outcome = chat.send("What is on this page?", &reference(), 3);
    assert_eq!(outcome, SendOutcome::Sent);
    assert!(chat.is_awaiting_reply());
    assert_eq!(chat.transcript().len(), 1);

    settle(&mut chat);

    let messages = chat.transcript().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "What is on this page?");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "It lists quarterly revenue.");

    assert_eq!(
        backend.requests(),
        vec![ChatRequest {
            message: "What is on this page?".to_string(),
            file_url: "https://files.example/report.pdf?raw=1".to_string(),
            page_number: 3,
        }]
    );
}

#[test]
fn failed_turn_reports_fixed_text() {
    let backend = Arc::new(FakeChatBackend::failing());
    let mut chat = ChatSession::new(backend);

    assert_eq!(chat.send("Summarize", &reference(), 1), SendOutcome::Sent);
    settle(&mut chat);

    let messages = chat.transcript().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Summarize");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, FAILED_REPLY);
    assert!(!chat.is_awaiting_reply());
}

#[test]
fn second_send_while_awaiting_is_rejected() {
    let backend = Arc::new(
        FakeChatBackend::replying(["first", "second"]).with_delay(Duration::from_millis(100)),
    );
    let mut chat = ChatSession::new(backend.clone());

    assert_eq!(chat.send("one", &reference(), 1), SendOutcome::Sent);

    chat.set_input("two");
    assert_eq!(chat.submit(&reference(), 2), SendOutcome::Busy);
    assert_eq!(chat.pending_input(), "two");
    assert_eq!(chat.transcript().len(), 1);

    settle(&mut chat);
    assert_eq!(chat.transcript().len(), 2);
    assert_eq!(backend.call_count(), 1);

    assert_eq!(chat.submit(&reference(), 2), SendOutcome::Sent);
    assert!(chat.pending_input().is_empty());
    settle(&mut chat);

    let contents: Vec<&str> = chat
        .transcript()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["one", "first", "two", "second"]);
    assert_eq!(backend.requests()[1].page_number, 2);
}

#[test]
fn submit_trims_and_clears_input() {
    let backend = Arc::new(FakeChatBackend::replying(Vec::<String>::new()));
    let mut chat = ChatSession::new(backend.clone());

    chat.set_input("  hello there  ");
    assert_eq!(chat.submit(&reference(), 4), SendOutcome::Sent);
    assert!(chat.pending_input().is_empty());
    settle(&mut chat);

    let messages = chat.transcript().messages();
    assert_eq!(messages[0].content, "hello there");
    assert_eq!(messages[1].content, "echo: hello there");
}
