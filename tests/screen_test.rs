use std::sync::Arc;

use pagechat::event_source::{KeyCode, SimulatedEventSource};
use pagechat::pdf::Phase;
use pagechat::screen::{Focus, ScreenConfig, ViewerChatScreen};
use pagechat::test_utils::test_helpers::*;
use pagechat::run_screen_with_event_source;
use pagechat::theme::OCEANIC_NEXT;
use ratatui::Terminal;
use ratatui::backend::TestBackend;

const DOC: &str = "https://files.example/slides.pdf?dl=1";

struct Harness {
    terminal: Terminal<TestBackend>,
    screen: ViewerChatScreen,
    source: Arc<FakeSource>,
    chat: Arc<FakeChatBackend>,
}

impl Harness {
    fn new(reference: Option<&str>, pages: usize) -> Self {
        let source = Arc::new(FakeSource::serving(fake_document(pages)));
        let chat = Arc::new(FakeChatBackend::replying(["Page two shows the roadmap."]));
        let services = fake_services(source.clone(), fake_engine(), chat.clone());
        let screen = ViewerChatScreen::mount(
            reference.map(str::to_string),
            services,
            ScreenConfig::default(),
        );
        Self {
            terminal: create_test_terminal(100, 30),
            screen,
            source,
            chat,
        }
    }

    fn draw(&mut self) -> String {
        self.terminal.draw(|f| self.screen.draw(f)).unwrap();
        capture_terminal_state(&self.terminal)
    }

    /// Tick and redraw until `done` holds
    fn run_until(&mut self, mut done: impl FnMut(&ViewerChatScreen) -> bool) {
        let terminal = &mut self.terminal;
        assert!(pump_until(
            &mut self.screen,
            |s| {
                s.tick();
                terminal.draw(|f| s.draw(f)).unwrap();
            },
            |s| done(s),
        ));
    }

    fn wait_for_page(&mut self) {
        self.run_until(|s| {
            s.viewer().phase() == Phase::DocumentReady
                && !s.viewer().state().is_page_loading
                && s.viewer().surface().is_valid()
        });
    }

    fn press(&mut self, event: pagechat::event_source::Event) {
        self.screen.handle_event(&event);
    }
}

#[test]
fn shows_prompt_without_document() {
    let mut h = Harness::new(None, 3);
    let screen = h.draw();

    assert!(screen.contains("No PDF URL provided."));
    assert_eq!(h.screen.viewer().phase(), Phase::NoDocument);
    assert_eq!(h.source.fetch_count(), 0);
}

#[test]
fn shows_page_counter_once_loaded() {
    let mut h = Harness::new(Some(DOC), 5);
    h.wait_for_page();
    let screen = h.draw();

    assert!(screen.contains("Page 1 of 5"), "{screen}");
    assert!(screen.contains("zoom 100%"));
    assert!(screen.contains("\u{2580}"));
    assert!(h.screen.viewer().state().container_width > 0);

    // help bar: previous is greyed out on the first page, next is not
    let buffer = h.terminal.backend().buffer();
    let help_row = buffer.area.height - 1;
    assert_eq!(buffer[(0, help_row)].symbol(), "p");
    assert_eq!(buffer[(0, help_row)].fg, OCEANIC_NEXT.base_02);
    assert_eq!(buffer[(14, help_row)].symbol(), "n");
    assert_eq!(buffer[(14, help_row)].fg, OCEANIC_NEXT.base_04);
}

#[test]
fn viewer_keys_page_and_zoom() {
    let mut h = Harness::new(Some(DOC), 3);
    h.wait_for_page();

    h.press(SimulatedEventSource::char_key('n'));
    h.press(SimulatedEventSource::key(KeyCode::Right));
    h.press(SimulatedEventSource::key(KeyCode::Right));
    assert_eq!(h.screen.viewer().state().current_page, 3);

    h.press(SimulatedEventSource::char_key('p'));
    assert_eq!(h.screen.viewer().state().current_page, 2);

    h.press(SimulatedEventSource::char_key('+'));
    assert_eq!(h.screen.viewer().state().zoom.percent(), 110);
    h.press(SimulatedEventSource::char_key('0'));
    assert_eq!(h.screen.viewer().state().zoom.percent(), 100);

    h.press(SimulatedEventSource::char_key('G'));
    assert_eq!(h.screen.viewer().state().current_page, 3);
    h.press(SimulatedEventSource::char_key('g'));
    assert_eq!(h.screen.viewer().state().current_page, 1);

    h.wait_for_page();
    assert!(h.draw().contains("Page 1 of 3"));
}

#[test]
fn chat_question_carries_current_page() {
    let mut h = Harness::new(Some(DOC), 3);
    h.wait_for_page();
    h.press(SimulatedEventSource::char_key('n'));

    h.press(SimulatedEventSource::key(KeyCode::Tab));
    assert_eq!(h.screen.focus(), Focus::Chat);

    // 'n' and 'q' are text while the chat has focus
    for c in "next q".chars() {
        h.press(SimulatedEventSource::char_key(c));
    }
    assert_eq!(h.screen.viewer().state().current_page, 2);
    assert!(!h.screen.should_quit());
    assert_eq!(h.screen.chat().pending_input(), "next q");

    h.press(SimulatedEventSource::key(KeyCode::Enter));
    assert!(h.screen.chat().is_awaiting_reply());
    h.run_until(|s| !s.chat().is_awaiting_reply());

    let requests = h.chat.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].page_number, 2);
    assert_eq!(requests[0].file_url, "https://files.example/slides.pdf?raw=1");

    let screen = h.draw();
    assert!(screen.contains("You"));
    assert!(screen.contains("next q"));
    assert!(screen.contains("Page two shows the roadmap."));

    h.press(SimulatedEventSource::key(KeyCode::Esc));
    assert_eq!(h.screen.focus(), Focus::Viewer);
}

#[test]
fn chat_without_document_sends_nothing() {
    let mut h = Harness::new(None, 3);
    h.press(SimulatedEventSource::key(KeyCode::Tab));
    for c in "hello".chars() {
        h.press(SimulatedEventSource::char_key(c));
    }
    h.press(SimulatedEventSource::key(KeyCode::Enter));

    assert!(!h.screen.chat().is_awaiting_reply());
    assert!(h.screen.chat().transcript().is_empty());
    assert_eq!(h.chat.call_count(), 0);
}

#[test]
fn run_loop_processes_scripted_input() {
    let mut h = Harness::new(Some(DOC), 4);
    h.wait_for_page();

    let mut events = TestScenarioBuilder::new()
        .next_page(2)
        .press_tab()
        .type_text("q")
        .quit()
        .build();
    run_screen_with_event_source(&mut h.terminal, &mut h.screen, &mut events).unwrap();

    assert!(h.screen.should_quit());
    assert_eq!(h.screen.viewer().state().current_page, 3);
    assert_eq!(h.screen.chat().pending_input(), "q");
}

#[test]
fn ctrl_c_quits_from_viewer() {
    let mut h = Harness::new(Some(DOC), 2);
    h.press(SimulatedEventSource::ctrl_char_key('c'));
    assert!(h.screen.should_quit());

    let mut h = Harness::new(Some(DOC), 2);
    h.press(SimulatedEventSource::char_key('q'));
    assert!(h.screen.should_quit());
}

#[test]
fn load_failure_shows_no_document_state() {
    let source = Arc::new(FakeSource::failing(pagechat::source::FetchError::Status(404)));
    let chat = Arc::new(FakeChatBackend::replying(["unused"]));
    let services = fake_services(source, fake_engine(), chat);
    let mut screen =
        ViewerChatScreen::mount(Some(DOC.to_string()), services, ScreenConfig::default());
    let mut terminal = create_test_terminal(100, 30);

    assert!(pump_screen(&mut screen, |s| s.viewer().phase() == Phase::Failed));
    terminal.draw(|f| screen.draw(f)).unwrap();
    let text = capture_terminal_state(&terminal);

    assert!(text.contains("No document: failed to fetch document"), "{text}");
    assert!(!text.contains("Page 1 of"));
    assert!(!screen.viewer().surface().is_valid());
}
