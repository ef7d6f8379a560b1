//! Application state for the interactive session.

use ryl_core::{Phase, Session};

use crate::editor::EditorLifecycle;

/// Everything the reducer and renderer read and mutate.
#[derive(Debug)]
pub struct AppState {
    pub session: Session,
    pub editor: EditorLifecycle,
    /// Prompt of the pending input request, while one is open.
    pub input_prompt: Option<String>,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        let mut editor = EditorLifecycle::new();
        editor.open();
        Self {
            session,
            editor,
            input_prompt: None,
            should_quit: false,
        }
    }

    /// True while the runtime is collecting a reply for the host.
    pub fn replying(&self) -> bool {
        self.input_prompt.is_some()
    }

    pub fn awaiting(&self) -> bool {
        matches!(self.session.phase(), Phase::Awaiting(_))
    }
}
