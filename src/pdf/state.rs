//! Viewer state management

use super::types::RenderTarget;
use super::zoom::Zoom;

/// Current view of a document: page, zoom and loading flags
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerState {
    /// Current page (1-based once the page count is known)
    pub current_page: usize,

    /// Total page count, 0 until the document is parsed
    pub page_count: usize,

    /// User zoom factor
    pub zoom: Zoom,

    /// Width of the page container in pixels, 0 until laid out
    pub container_width: u32,

    pub is_document_loading: bool,
    pub is_page_loading: bool,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_count: 0,
            zoom: Zoom::default(),
            container_width: 0,
            is_document_loading: false,
            is_page_loading: false,
        }
    }
}

impl ViewerState {
    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::DocumentLoaded { page_count } => {
                self.page_count = page_count;
                self.current_page = 1;
                self.is_document_loading = false;
                vec![Effect::RenderCurrentPage]
            }

            Command::NextPage => self.go_to(self.current_page.saturating_add(1)),

            Command::PreviousPage => self.go_to(self.current_page.saturating_sub(1)),

            Command::GoToPage(page) => self.go_to(page),

            Command::SetZoom(zoom) => {
                if self.zoom != zoom {
                    self.zoom = zoom;
                    self.render_if_ready()
                } else {
                    vec![]
                }
            }

            Command::SetContainerWidth(width) => {
                if self.container_width != width {
                    self.container_width = width;
                    self.render_if_ready()
                } else {
                    vec![]
                }
            }
        }
    }

    fn go_to(&mut self, page: usize) -> Vec<Effect> {
        if self.page_count == 0 {
            return vec![];
        }
        let clamped = page.clamp(1, self.page_count);
        if self.current_page != clamped {
            self.current_page = clamped;
            vec![Effect::RenderCurrentPage]
        } else {
            vec![]
        }
    }

    fn render_if_ready(&self) -> Vec<Effect> {
        if self.page_count > 0 {
            vec![Effect::RenderCurrentPage]
        } else {
            vec![]
        }
    }

    /// The (page, zoom, width) a render issued now would show
    #[must_use]
    pub fn render_target(&self) -> RenderTarget {
        RenderTarget {
            page: self.current_page,
            zoom: self.zoom.factor(),
            container_width: self.container_width,
        }
    }

    #[must_use]
    pub fn is_first_page(&self) -> bool {
        self.current_page <= 1
    }

    #[must_use]
    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.page_count
    }
}

/// Commands that modify viewer state
#[derive(Clone, Copy, Debug)]
pub enum Command {
    /// Document parsed with this many pages
    DocumentLoaded { page_count: usize },
    /// Advance one page, stopping at the last
    NextPage,
    /// Go back one page, stopping at the first
    PreviousPage,
    /// Go to a 1-based page, clamped
    GoToPage(usize),
    /// Replace the zoom factor
    SetZoom(Zoom),
    /// Update the container width
    SetContainerWidth(u32),
}

/// Effects produced by state changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Render the current page for the current target
    RenderCurrentPage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(page_count: usize) -> ViewerState {
        let mut state = ViewerState::default();
        let _ = state.apply(Command::DocumentLoaded { page_count });
        state
    }

    #[test]
    fn document_loaded_starts_at_first_page() {
        let mut state = ViewerState {
            is_document_loading: true,
            ..ViewerState::default()
        };
        let effects = state.apply(Command::DocumentLoaded { page_count: 5 });

        assert_eq!(state.current_page, 1);
        assert_eq!(state.page_count, 5);
        assert!(!state.is_document_loading);
        assert_eq!(effects, vec![Effect::RenderCurrentPage]);
    }

    #[test]
    fn next_page_clamps_at_last_page() {
        let mut state = loaded(4);
        for _ in 0..4 {
            let _ = state.apply(Command::NextPage);
        }
        assert_eq!(state.current_page, 4);

        let effects = state.apply(Command::NextPage);
        assert_eq!(state.current_page, 4);
        assert!(effects.is_empty());
    }

    #[test]
    fn previous_page_clamps_at_first_page() {
        let mut state = loaded(5);
        let effects = state.apply(Command::PreviousPage);
        assert_eq!(state.current_page, 1);
        assert!(effects.is_empty());
    }

    #[test]
    fn go_to_page_clamps_to_range() {
        let mut state = loaded(10);

        let effects = state.apply(Command::GoToPage(999));
        assert_eq!(state.current_page, 10);
        assert_eq!(effects, vec![Effect::RenderCurrentPage]);

        let _ = state.apply(Command::GoToPage(0));
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn pagination_before_load_is_ignored() {
        let mut state = ViewerState::default();
        assert!(state.apply(Command::NextPage).is_empty());
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn zoom_change_renders_only_when_different() {
        let mut state = loaded(3);
        let zoom = Zoom::new(1.5).unwrap();

        assert_eq!(
            state.apply(Command::SetZoom(zoom)),
            vec![Effect::RenderCurrentPage]
        );
        assert!(state.apply(Command::SetZoom(zoom)).is_empty());
        assert_eq!(state.render_target().zoom, 1.5);
    }

    #[test]
    fn container_width_before_load_only_records() {
        let mut state = ViewerState::default();
        assert!(state.apply(Command::SetContainerWidth(640)).is_empty());
        assert_eq!(state.container_width, 640);
    }
}
