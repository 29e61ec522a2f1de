pub mod test_helpers {
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use image::{Rgb, RgbImage};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::chat::{ChatBackend, ChatRequest, ChatSession, ChatTransportError};
    use crate::event_source::{Event, KeyCode, SimulatedEventSource};
    use crate::pdf::{
        EngineFactory, PageRenderer, PageSize, ParseError, RasterEngine, RenderError,
        ViewerController,
    };
    use crate::screen::{ScreenServices, ViewerChatScreen};
    use crate::source::{DocumentReference, DocumentSource, FetchError};

    /// How long pump helpers wait before giving up
    pub const PUMP_TIMEOUT: Duration = Duration::from_secs(5);

    /// Bytes the fake engine accepts as a document with `pages` pages
    #[must_use]
    pub fn fake_document(pages: usize) -> Vec<u8> {
        format!("pages:{pages}").into_bytes()
    }

    /// In-memory document source that counts its calls
    pub struct FakeSource {
        response: Result<Vec<u8>, FetchError>,
        delay: Duration,
        calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl FakeSource {
        #[must_use]
        pub fn serving(bytes: Vec<u8>) -> Self {
            Self::with_response(Ok(bytes))
        }

        #[must_use]
        pub fn failing(error: FetchError) -> Self {
            Self::with_response(Err(error))
        }

        fn with_response(response: Result<Vec<u8>, FetchError>) -> Self {
            Self {
                response,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }

        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn fetch_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// References passed to `fetch`, in call order
        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl DocumentSource for FakeSource {
        fn fetch(&self, reference: &DocumentReference) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested
                .lock()
                .unwrap()
                .push(reference.as_str().to_string());
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            match &self.response {
                Ok(bytes) => Ok(bytes.clone()),
                Err(e) => Err(copy_fetch_error(e)),
            }
        }
    }

    fn copy_fetch_error(error: &FetchError) -> FetchError {
        match error {
            FetchError::Transport(msg) => FetchError::Transport(msg.clone()),
            FetchError::Status(code) => FetchError::Status(*code),
            FetchError::Body(e) => FetchError::Body(std::io::Error::new(e.kind(), e.to_string())),
        }
    }

    /// Behaviour of the fake raster engine.
    ///
    /// Documents are the text `pages:N`. Every page has `page_size`, and a
    /// rendered page is filled with `page_color(page)`.
    #[derive(Clone, Debug)]
    pub struct FakeEngineConfig {
        pub page_size: PageSize,
        /// Per page (1-based) rasterize delay
        pub delays: HashMap<usize, Duration>,
        /// Pages (1-based) whose rasterize fails
        pub failing_pages: HashSet<usize>,
    }

    impl Default for FakeEngineConfig {
        fn default() -> Self {
            Self {
                page_size: PageSize::new(600.0, 800.0),
                delays: HashMap::new(),
                failing_pages: HashSet::new(),
            }
        }
    }

    impl FakeEngineConfig {
        #[must_use]
        pub fn page_size(mut self, width: f32, height: f32) -> Self {
            self.page_size = PageSize::new(width, height);
            self
        }

        #[must_use]
        pub fn slow_page(mut self, page: usize, delay: Duration) -> Self {
            self.delays.insert(page, delay);
            self
        }

        #[must_use]
        pub fn failing_page(mut self, page: usize) -> Self {
            self.failing_pages.insert(page);
            self
        }

        #[must_use]
        pub fn factory(self) -> EngineFactory {
            let config = Arc::new(self);
            Arc::new(move || {
                Box::new(FakeEngine {
                    config: Arc::clone(&config),
                    page_count: 0,
                }) as Box<dyn RasterEngine>
            })
        }
    }

    /// Engine factory with default fake behaviour
    #[must_use]
    pub fn fake_engine() -> EngineFactory {
        FakeEngineConfig::default().factory()
    }

    /// Fill color of a rendered page
    #[must_use]
    pub fn page_color(page: usize) -> Rgb<u8> {
        Rgb([(page % 256) as u8, 0x40, 0x80])
    }

    struct FakeEngine {
        config: Arc<FakeEngineConfig>,
        page_count: usize,
    }

    impl RasterEngine for FakeEngine {
        fn open(&mut self, bytes: &[u8]) -> Result<Vec<PageSize>, ParseError> {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| ParseError::Malformed("not utf-8".to_string()))?;
            let count: usize = text
                .trim()
                .strip_prefix("pages:")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| ParseError::Malformed(format!("unexpected header {text:?}")))?;
            if count == 0 {
                return Err(ParseError::Empty);
            }
            self.page_count = count;
            Ok(vec![self.config.page_size; count])
        }

        fn rasterize(&mut self, page_index: usize, scale: f32) -> Result<RgbImage, RenderError> {
            let page = page_index + 1;
            if let Some(delay) = self.config.delays.get(&page) {
                std::thread::sleep(*delay);
            }
            if page > self.page_count {
                return Err(RenderError::engine(format!("no page {page}")));
            }
            if self.config.failing_pages.contains(&page) {
                return Err(RenderError::engine(format!("page {page} is corrupt")));
            }
            let (width, height) = self.config.page_size.viewport(scale).pixel_size();
            Ok(RgbImage::from_pixel(width, height, page_color(page)))
        }
    }

    /// Chat backend that records requests and answers from a script
    pub struct FakeChatBackend {
        replies: Mutex<VecDeque<Result<String, ChatTransportError>>>,
        requests: Mutex<Vec<ChatRequest>>,
        delay: Duration,
    }

    impl FakeChatBackend {
        /// Answers with `replies` in order, then with an echo of the message
        #[must_use]
        pub fn replying<I, S>(replies: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self::scripted(replies.into_iter().map(|r| Ok(r.into())).collect())
        }

        /// Every call fails with a transport error
        #[must_use]
        pub fn failing() -> Self {
            Self::scripted(VecDeque::from([Err(ChatTransportError::Transport(
                "connection refused".to_string(),
            ))]))
        }

        fn scripted(replies: VecDeque<Result<String, ChatTransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }

        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl ChatBackend for FakeChatBackend {
        fn ask(&self, request: &ChatRequest) -> Result<String, ChatTransportError> {
            self.requests.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            let mut replies = self.replies.lock().unwrap();
            match replies.pop_front() {
                Some(Err(e)) => {
                    // failures repeat
                    replies.push_front(Err(e.clone()));
                    Err(e)
                }
                Some(reply) => reply,
                None => Ok(format!("echo: {}", request.message)),
            }
        }
    }

    /// Viewer wired to a fake source and engine with default margins
    #[must_use]
    pub fn fake_viewer(
        reference: Option<&str>,
        source: Arc<FakeSource>,
        engine: EngineFactory,
    ) -> ViewerController {
        let reference = reference.and_then(|r| DocumentReference::new(r).ok());
        ViewerController::new(reference, source, engine, PageRenderer::default())
    }

    #[must_use]
    pub fn fake_services(
        source: Arc<FakeSource>,
        engine: EngineFactory,
        chat: Arc<FakeChatBackend>,
    ) -> ScreenServices {
        ScreenServices {
            source,
            engine,
            chat,
        }
    }

    /// Call `step` until `done` holds or [`PUMP_TIMEOUT`] passes.
    /// Returns whether `done` was reached.
    pub fn pump_until<T>(
        subject: &mut T,
        mut step: impl FnMut(&mut T),
        mut done: impl FnMut(&T) -> bool,
    ) -> bool {
        let deadline = Instant::now() + PUMP_TIMEOUT;
        loop {
            step(subject);
            if done(subject) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn pump_viewer(
        viewer: &mut ViewerController,
        done: impl FnMut(&ViewerController) -> bool,
    ) -> bool {
        pump_until(
            viewer,
            |v| {
                v.poll();
            },
            done,
        )
    }

    pub fn pump_chat(chat: &mut ChatSession, done: impl FnMut(&ChatSession) -> bool) -> bool {
        pump_until(
            chat,
            |c| {
                c.poll();
            },
            done,
        )
    }

    pub fn pump_screen(
        screen: &mut ViewerChatScreen,
        done: impl FnMut(&ViewerChatScreen) -> bool,
    ) -> bool {
        pump_until(
            screen,
            |s| {
                s.tick();
            },
            done,
        )
    }

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        #[must_use]
        pub fn press_ctrl_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key(c));
            self
        }

        #[must_use]
        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events.push(SimulatedEventSource::key(code));
            self
        }

        #[must_use]
        pub fn press_enter(self) -> Self {
            self.press_key(KeyCode::Enter)
        }

        #[must_use]
        pub fn press_tab(self) -> Self {
            self.press_key(KeyCode::Tab)
        }

        #[must_use]
        pub fn press_esc(self) -> Self {
            self.press_key(KeyCode::Esc)
        }

        /// Type every character of `text`
        #[must_use]
        pub fn type_text(mut self, text: &str) -> Self {
            for c in text.chars() {
                self.events.push(SimulatedEventSource::char_key(c));
            }
            self
        }

        #[must_use]
        pub fn next_page(self, times: usize) -> Self {
            (0..times).fold(self, |b, _| b.press_char('n'))
        }

        #[must_use]
        pub fn prev_page(self, times: usize) -> Self {
            (0..times).fold(self, |b, _| b.press_char('p'))
        }

        #[must_use]
        pub fn zoom_in(self) -> Self {
            self.press_char('+')
        }

        #[must_use]
        pub fn zoom_out(self) -> Self {
            self.press_char('-')
        }

        /// Quit from any focus (Ctrl+C)
        #[must_use]
        pub fn quit(self) -> Self {
            self.press_ctrl_char('c')
        }

        #[must_use]
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }

        #[must_use]
        pub fn events(&self) -> &[Event] {
            &self.events
        }
    }

    /// Create a test terminal for snapshot testing
    #[must_use]
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Capture the current terminal buffer as a string
    #[must_use]
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use crate::pdf::{PageSize, ParseError};

    #[test]
    fn test_scenario_builder() {
        let scenario = TestScenarioBuilder::new()
            .next_page(2)
            .press_tab()
            .type_text("hi")
            .press_enter()
            .quit();

        assert_eq!(scenario.events().len(), 7);
        assert_eq!(scenario.build().remaining(), 7);
    }

    #[test]
    fn fake_engine_parses_page_header() {
        let mut engine = fake_engine()();
        let pages = engine.open(&fake_document(3)).unwrap();
        assert_eq!(pages, vec![PageSize::new(600.0, 800.0); 3]);

        let raster = engine.rasterize(1, 0.5).unwrap();
        assert_eq!(raster.dimensions(), (300, 400));
        assert_eq!(*raster.get_pixel(0, 0), page_color(2));

        assert!(matches!(
            engine.open(b"%PDF-garbage"),
            Err(ParseError::Malformed(_))
        ));
        assert_eq!(engine.open(&fake_document(0)), Err(ParseError::Empty));
    }
}
