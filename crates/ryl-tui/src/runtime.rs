//! Runtime: owns the terminal and the protocol client, runs the event
//! loop, and executes reducer effects.
//!
//! This is the only module in the crate that performs I/O. The loop is
//! synchronous: terminal events are polled with a frame timeout and host
//! messages are drained non-blocking each frame.

use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ryl_core::config::Config;
use ryl_core::{ProtocolClient, Session, interrupt};
use tracing::warn;

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::AppState;
use crate::{render, terminal, update};

/// Poll timeout while an evaluation is streaming.
const FRAME_DURATION: Duration = Duration::from_millis(16);

/// Poll timeout while idle, to keep CPU usage down.
const IDLE_POLL_DURATION: Duration = Duration::from_millis(100);

/// Full-screen interactive session.
///
/// Terminal state is restored on drop, panic, and Ctrl+C.
pub struct TuiRuntime {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    state: AppState,
    client: ProtocolClient,
    eval_timeout: Duration,
    /// Host-response deadline for the in-flight evaluation. Suspended
    /// (`None`) while the user is typing an input-request reply.
    deadline: Option<Instant>,
}

impl TuiRuntime {
    pub fn new(config: &Config, client: ProtocolClient) -> Result<Self> {
        terminal::install_panic_hook();
        interrupt::set_restore_hook(|| {
            let _ = terminal::restore_terminal();
        });
        interrupt::reset();

        let terminal = terminal::setup_terminal().context("Failed to setup terminal")?;
        let state = AppState::new(Session::new(config.session.continuation));
        Ok(Self {
            terminal,
            state,
            client,
            eval_timeout: config.eval_timeout(),
            deadline: None,
        })
    }

    /// Pre-loads the configured snippet into the first surface and, when
    /// asked, submits it immediately.
    pub fn bootstrap(&mut self, snippet: &str, auto_submit: bool) {
        if let Some(buffer) = self.state.editor.active_mut() {
            buffer.insert_str(snippet);
        }
        if auto_submit {
            let effects = update::update(
                &mut self.state,
                UiEvent::Terminal(Event::Key(KeyEvent::new(
                    KeyCode::Enter,
                    KeyModifiers::NONE,
                ))),
            );
            self.execute_effects(effects);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let result = self.event_loop();
        let _ = terminal::restore_terminal();
        result
    }

    fn event_loop(&mut self) -> Result<()> {
        while !self.state.should_quit {
            if interrupt::should_terminate() {
                break;
            }
            if interrupt::is_interrupted() {
                interrupt::reset();
                let effects = update::update(&mut self.state, UiEvent::Interrupted);
                self.execute_effects(effects);
                if self.state.should_quit {
                    // A signal-initiated quit propagates as an interrupt
                    // so the process exits 130, not 0.
                    return Err(interrupt::InterruptedError.into());
                }
            }

            self.drain_host_events();
            self.check_deadline();

            // Redrawn every frame; the request only needs consuming.
            let _ = self.state.editor.take_scroll_request();
            let state = &self.state;
            self.terminal
                .draw(|frame| render::draw(frame, state))
                .context("Failed to draw frame")?;

            let poll = if self.client.in_flight() {
                FRAME_DURATION
            } else {
                IDLE_POLL_DURATION
            };
            if event::poll(poll).context("Failed to poll terminal events")? {
                let term_event = event::read().context("Failed to read terminal event")?;
                let effects = update::update(&mut self.state, UiEvent::Terminal(term_event));
                self.execute_effects(effects);
            }
        }
        Ok(())
    }

    fn drain_host_events(&mut self) {
        loop {
            match self.client.try_next_event() {
                Ok(Some(host_event)) => {
                    self.deadline = Some(Instant::now() + self.eval_timeout);
                    let effects = update::update(&mut self.state, UiEvent::Host(host_event));
                    self.execute_effects(effects);
                    if !self.client.in_flight() {
                        self.deadline = None;
                    }
                    if self.state.replying() {
                        // No deadline while the host is waiting on the user.
                        self.deadline = None;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    self.fail_evaluation(&err.to_string());
                    break;
                }
            }
        }
    }

    fn check_deadline(&mut self) {
        if let Some(deadline) = self.deadline
            && self.client.in_flight()
            && Instant::now() > deadline
        {
            self.fail_evaluation("execution host is not responding");
        }
    }

    fn fail_evaluation(&mut self, note: &str) {
        warn!(note, "abandoning evaluation");
        self.client.abandon();
        self.deadline = None;
        let effects = update::update(
            &mut self.state,
            UiEvent::HostFailure {
                note: note.to_string(),
            },
        );
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            match effect {
                UiEffect::Dispatch { source } => match self.client.begin(&source) {
                    Ok(()) => self.deadline = Some(Instant::now() + self.eval_timeout),
                    Err(err) => self.fail_evaluation(&err.to_string()),
                },
                UiEffect::SendReply { line } => match self.client.send_reply(&line) {
                    Ok(()) => self.deadline = Some(Instant::now() + self.eval_timeout),
                    Err(err) => self.fail_evaluation(&err.to_string()),
                },
                UiEffect::SendControl(cmd) => self.client.send_control(cmd),
                UiEffect::Quit => self.state.should_quit = true,
            }
        }
    }
}

impl Drop for TuiRuntime {
    fn drop(&mut self) {
        let _ = terminal::restore_terminal();
    }
}
