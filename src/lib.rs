// Export modules for use in tests
pub mod chat;
pub mod event_source;
pub mod panic_handler;
pub mod pdf;
pub mod screen;
pub mod settings;
pub mod source;
pub mod theme;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use screen::{
    Focus, ScreenConfig, ScreenServices, ViewerChatScreen, run_screen_with_event_source,
};
