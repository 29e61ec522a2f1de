use anyhow::Result;
pub use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
use std::collections::VecDeque;
use std::time::Duration;

/// Source of terminal events, swappable for scripted input in tests
pub trait EventSource {
    /// Wait up to `timeout` for an event
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    fn read(&mut self) -> Result<Event>;
}

/// Events from the real terminal
pub struct KeyboardEventSource;

impl EventSource for KeyboardEventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        Ok(crossterm::event::poll(timeout)?)
    }

    fn read(&mut self) -> Result<Event> {
        Ok(crossterm::event::read()?)
    }
}

/// Scripted events. Once the script runs out every read yields Ctrl+C
/// so a driven screen always terminates.
pub struct SimulatedEventSource {
    events: VecDeque<Event>,
}

impl SimulatedEventSource {
    #[must_use]
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into(),
        }
    }

    #[must_use]
    pub fn key_event(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        })
    }

    #[must_use]
    pub fn key(code: KeyCode) -> Event {
        Self::key_event(code, KeyModifiers::empty())
    }

    #[must_use]
    pub fn char_key(c: char) -> Event {
        Self::key_event(KeyCode::Char(c), KeyModifiers::empty())
    }

    #[must_use]
    pub fn ctrl_char_key(c: char) -> Event {
        Self::key_event(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    /// Scripted events not read yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!self.events.is_empty())
    }

    fn read(&mut self) -> Result<Event> {
        Ok(self
            .events
            .pop_front()
            .unwrap_or_else(|| Self::ctrl_char_key('c')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_event_source() {
        let events = vec![
            SimulatedEventSource::char_key('n'),
            SimulatedEventSource::key(KeyCode::Tab),
        ];

        let mut source = SimulatedEventSource::new(events);
        assert!(source.poll(Duration::ZERO).unwrap());

        if let Event::Key(key) = source.read().unwrap() {
            assert_eq!(key.code, KeyCode::Char('n'));
            assert!(key.modifiers.is_empty());
        }
        if let Event::Key(key) = source.read().unwrap() {
            assert_eq!(key.code, KeyCode::Tab);
        }

        assert!(!source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn exhausted_source_yields_ctrl_c() {
        let mut source = SimulatedEventSource::new(vec![]);
        match source.read().unwrap() {
            Event::Key(key) => {
                assert_eq!(key.code, KeyCode::Char('c'));
                assert!(key.modifiers.contains(KeyModifiers::CONTROL));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
