//! The reducer: all state mutation happens here.
//!
//! The runtime calls `update(app, event)` and executes the returned
//! effects; nothing in this module performs I/O.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ryl_core::{ControlCommand, HostEvent, SessionAction, Submission};
use ryl_core::history::Recall;

use crate::editor::{CursorMove, TextBuffer};
use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::AppState;

pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Tick => vec![],
        UiEvent::Host(host) => handle_host_event(app, host),
        UiEvent::HostFailure { note } => {
            app.session.fail_evaluation(&note);
            reopen_editor(app);
            vec![]
        }
        UiEvent::Interrupted => {
            if app.awaiting() {
                vec![UiEffect::SendControl(ControlCommand::Quit)]
            } else {
                app.should_quit = true;
                vec![UiEffect::Quit]
            }
        }
        UiEvent::Terminal(term_event) => handle_terminal_event(app, &term_event),
    }
}

fn handle_host_event(app: &mut AppState, event: HostEvent) -> Vec<UiEffect> {
    match app.session.on_host_event(event) {
        SessionAction::None => {
            app.editor.request_scroll();
        }
        SessionAction::RequestInput { prompt } => {
            app.input_prompt = Some(prompt);
            app.editor.open();
        }
        SessionAction::Finished => reopen_editor(app),
    }
    vec![]
}

/// Returns to editing after a final message or a recovered failure. The
/// reply surface is kept if one was open (the host finished without
/// waiting for the answer).
fn reopen_editor(app: &mut AppState) {
    app.input_prompt = None;
    if app.editor.active().is_none() {
        app.editor.open();
    }
    app.editor.request_scroll();
}

fn handle_terminal_event(app: &mut AppState, event: &Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) if !matches!(key.kind, KeyEventKind::Release) => handle_key(app, *key),
        Event::Paste(text) => {
            if (!app.awaiting() || app.replying())
                && let Some(buffer) = app.editor.active_mut()
            {
                buffer.insert_str(text);
            }
            vec![]
        }
        _ => vec![],
    }
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                return if app.awaiting() {
                    vec![UiEffect::SendControl(ControlCommand::Quit)]
                } else {
                    app.should_quit = true;
                    vec![UiEffect::Quit]
                };
            }
            KeyCode::Char('d') => {
                let empty = app.editor.active().is_none_or(TextBuffer::is_empty);
                if !app.awaiting() && empty {
                    app.should_quit = true;
                    return vec![UiEffect::Quit];
                }
                return vec![];
            }
            _ => {}
        }
    }

    if app.replying() {
        return handle_reply_key(app, key);
    }
    if app.awaiting() {
        return handle_debugger_key(key);
    }
    handle_editing_key(app, key)
}

fn handle_reply_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if key.code == KeyCode::Enter {
        let line = app.editor.retire().join("\n");
        app.editor.open();
        app.input_prompt = None;
        app.session.input_replied();
        return vec![UiEffect::SendReply { line }];
    }
    if let Some(buffer) = app.editor.active_mut() {
        buffer.input(key);
    }
    vec![]
}

/// While an evaluation streams, the function keys drive the debugger.
fn handle_debugger_key(key: KeyEvent) -> Vec<UiEffect> {
    match key.code {
        KeyCode::F(5) => vec![UiEffect::SendControl(ControlCommand::Continue)],
        KeyCode::F(6) => vec![UiEffect::SendControl(ControlCommand::Traceback)],
        KeyCode::F(10) => vec![UiEffect::SendControl(ControlCommand::Step)],
        _ => vec![],
    }
}

fn handle_editing_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    match key.code {
        KeyCode::Enter => {
            let text = app
                .editor
                .active()
                .map(TextBuffer::text)
                .unwrap_or_default();
            match app.session.submit(&text) {
                Submission::Continue => {
                    if let Some(buffer) = app.editor.active_mut() {
                        buffer.insert_newline();
                    }
                    vec![]
                }
                Submission::Dispatch { source, .. } => {
                    app.editor.retire();
                    vec![UiEffect::Dispatch { source }]
                }
                Submission::Rejected => vec![],
            }
        }
        // Up/Down are overloaded: history recall for a single-line
        // buffer, plain cursor movement once the buffer has grown.
        KeyCode::Up => {
            if app.editor.active().is_some_and(|b| b.line_count() == 1) {
                let recall = app.session.history_mut().previous();
                apply_recall(app, recall);
            } else if let Some(buffer) = app.editor.active_mut() {
                buffer.move_cursor(CursorMove::Up);
            }
            vec![]
        }
        KeyCode::Down => {
            if app.editor.active().is_some_and(|b| b.line_count() == 1) {
                let recall = app.session.history_mut().next();
                apply_recall(app, recall);
            } else if let Some(buffer) = app.editor.active_mut() {
                buffer.move_cursor(CursorMove::Down);
            }
            vec![]
        }
        _ => {
            if let Some(buffer) = app.editor.active_mut() {
                buffer.input(key);
            }
            vec![]
        }
    }
}

fn apply_recall(app: &mut AppState, recall: Recall) {
    let Some(buffer) = app.editor.active_mut() else {
        return;
    };
    match recall {
        Recall::Entry(text) => buffer.set_text(&text),
        Recall::ClearBuffer => buffer.clear(),
        Recall::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ryl_core::{EvalResult, Phase, ResultKind, Session, StreamKind, TranscriptItem};

    fn app() -> AppState {
        AppState::new(Session::default())
    }

    fn key(code: KeyCode) -> UiEvent {
        UiEvent::Terminal(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn ctrl(ch: char) -> UiEvent {
        UiEvent::Terminal(Event::Key(KeyEvent::new(
            KeyCode::Char(ch),
            KeyModifiers::CONTROL,
        )))
    }

    fn type_str(app: &mut AppState, text: &str) {
        for ch in text.chars() {
            update(app, key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn enter_dispatches_a_complete_statement() {
        let mut app = app();
        type_str(&mut app, "1+1");
        let effects = update(&mut app, key(KeyCode::Enter));
        assert_eq!(
            effects,
            [UiEffect::Dispatch {
                source: "1+1".into()
            }]
        );
        assert!(app.awaiting());
        assert!(app.editor.active().is_none());
    }

    #[test]
    fn enter_continues_an_open_block() {
        let mut app = app();
        type_str(&mut app, "def f():");
        let effects = update(&mut app, key(KeyCode::Enter));
        assert!(effects.is_empty());
        assert_eq!(app.editor.active().unwrap().line_count(), 2);
        assert_eq!(app.session.phase(), Phase::Editing);
    }

    #[test]
    fn final_event_reopens_the_editor() {
        let mut app = app();
        type_str(&mut app, "1+1");
        update(&mut app, key(KeyCode::Enter));
        update(
            &mut app,
            UiEvent::Host(HostEvent::Final(EvalResult::Value("2".into()))),
        );
        assert_eq!(app.session.phase(), Phase::Editing);
        assert!(app.editor.active().unwrap().is_empty());
        let TranscriptItem::Block(block) = &app.session.transcript().items()[0] else {
            panic!("expected the frozen block");
        };
        assert_eq!(block.result.as_deref(), Some("2"));
        assert_eq!(block.result_kind, ResultKind::Value);
    }

    #[test]
    fn stream_events_land_in_the_transcript_while_awaiting() {
        let mut app = app();
        type_str(&mut app, "print(1+1)");
        update(&mut app, key(KeyCode::Enter));
        update(
            &mut app,
            UiEvent::Host(HostEvent::Stream {
                kind: StreamKind::Out,
                text: "2".into(),
            }),
        );
        assert!(matches!(
            app.session.transcript().items()[1],
            TranscriptItem::Stream { kind: StreamKind::Out, .. }
        ));
    }

    #[test]
    fn up_recalls_history_on_a_single_line_buffer() {
        let mut app = app();
        type_str(&mut app, "1+1");
        update(&mut app, key(KeyCode::Enter));
        update(&mut app, UiEvent::Host(HostEvent::Final(EvalResult::NoValue)));

        update(&mut app, key(KeyCode::Up));
        assert_eq!(app.editor.active().unwrap().text(), "1+1");
        update(&mut app, key(KeyCode::Down));
        assert!(app.editor.active().unwrap().is_empty());
    }

    #[test]
    fn up_moves_the_cursor_in_a_multi_line_buffer() {
        let mut app = app();
        type_str(&mut app, "def f():");
        update(&mut app, key(KeyCode::Enter));
        type_str(&mut app, "    return 1");
        update(&mut app, key(KeyCode::Up));
        assert_eq!(app.editor.active().unwrap().cursor().0, 0);
        // The buffer is untouched by history.
        assert_eq!(app.editor.active().unwrap().line_count(), 2);
    }

    #[test]
    fn input_request_collects_a_reply() {
        let mut app = app();
        type_str(&mut app, "input()");
        update(&mut app, key(KeyCode::Enter));
        update(
            &mut app,
            UiEvent::Host(HostEvent::InputRequest {
                prompt: "name? ".into(),
            }),
        );
        assert!(app.replying());

        type_str(&mut app, "world");
        let effects = update(&mut app, key(KeyCode::Enter));
        assert_eq!(
            effects,
            [UiEffect::SendReply {
                line: "world".into()
            }]
        );
        assert!(!app.replying());

        update(&mut app, UiEvent::Host(HostEvent::Final(EvalResult::NoValue)));
        assert_eq!(app.session.phase(), Phase::Editing);
    }

    #[test]
    fn timeout_recovers_to_editing_with_a_marker() {
        let mut app = app();
        type_str(&mut app, "1+1");
        update(&mut app, key(KeyCode::Enter));
        update(
            &mut app,
            UiEvent::HostFailure {
                note: "execution host is not responding".into(),
            },
        );
        assert_eq!(app.session.phase(), Phase::Editing);
        assert!(app.editor.active().is_some());
        assert!(matches!(
            app.session.transcript().items().last(),
            Some(TranscriptItem::ProtocolFailure { .. })
        ));
    }

    #[test]
    fn ctrl_c_quits_when_idle_and_cancels_when_awaiting() {
        let mut app = app();
        type_str(&mut app, "1+1");
        update(&mut app, key(KeyCode::Enter));
        assert_eq!(
            update(&mut app, ctrl('c')),
            [UiEffect::SendControl(ControlCommand::Quit)]
        );
        update(&mut app, UiEvent::Host(HostEvent::Final(EvalResult::NoValue)));
        assert_eq!(update(&mut app, ctrl('c')), [UiEffect::Quit]);
        assert!(app.should_quit);
    }

    #[test]
    fn interrupt_signal_cancels_when_awaiting_and_quits_when_idle() {
        let mut app = app();
        type_str(&mut app, "1+1");
        update(&mut app, key(KeyCode::Enter));
        assert_eq!(
            update(&mut app, UiEvent::Interrupted),
            [UiEffect::SendControl(ControlCommand::Quit)]
        );
        assert!(!app.should_quit);
        update(&mut app, UiEvent::Host(HostEvent::Final(EvalResult::NoValue)));
        assert_eq!(update(&mut app, UiEvent::Interrupted), [UiEffect::Quit]);
        assert!(app.should_quit);
    }

    #[test]
    fn ctrl_d_quits_only_on_an_empty_buffer() {
        let mut app = app();
        type_str(&mut app, "1");
        assert!(update(&mut app, ctrl('d')).is_empty());
        update(&mut app, key(KeyCode::Backspace));
        assert_eq!(update(&mut app, ctrl('d')), [UiEffect::Quit]);
    }

    #[test]
    fn function_keys_drive_the_debugger_while_awaiting() {
        let mut app = app();
        type_str(&mut app, "1+1");
        update(&mut app, key(KeyCode::Enter));
        assert_eq!(
            update(&mut app, key(KeyCode::F(5))),
            [UiEffect::SendControl(ControlCommand::Continue)]
        );
        assert_eq!(
            update(&mut app, key(KeyCode::F(6))),
            [UiEffect::SendControl(ControlCommand::Traceback)]
        );
        assert_eq!(
            update(&mut app, key(KeyCode::F(10))),
            [UiEffect::SendControl(ControlCommand::Step)]
        );
        // Ordinary keys are ignored while awaiting.
        assert!(update(&mut app, key(KeyCode::Char('x'))).is_empty());
    }
}
