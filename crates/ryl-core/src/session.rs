//! Session driver: the phase machine that ties the classifier, history,
//! transcript, and protocol together.
//!
//! Exactly one input block may be pending at a time. Every phase path,
//! including the failure path, ends back at [`Phase::Editing`]; a broken
//! evaluation can never leave the session wedged.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::should_continue;
use crate::history::History;
use crate::protocol::{EvalResult, HostEvent};
use crate::transcript::{BlockId, ResultKind, StreamKind, Transcript};

/// What the session is waiting on while an evaluation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Await {
    /// Output may arrive at any moment; the final message ends the wait.
    Streaming,
    /// The runtime is blocked on one line of user input.
    InputRequested,
}

/// Session phase. `Submitting` and `Rendering` are transient bookkeeping
/// states; the session only rests in `Editing` or `Awaiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Editing,
    Submitting,
    Awaiting(Await),
    Rendering,
}

/// How a trailing `\` continuation is treated when the block is finally
/// dispatched to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationPolicy {
    /// Send the block exactly as typed.
    #[default]
    Preserve,
    /// Join escaped line breaks before dispatch.
    Strip,
}

/// Outcome of offering a buffer for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Keep editing: insert a newline instead of dispatching.
    Continue,
    /// The block was frozen and should be dispatched to the runtime.
    Dispatch { block: BlockId, source: String },
    /// An evaluation is already pending; the buffer stays as-is.
    Rejected,
}

/// What the front-end must do after a host event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    None,
    /// Collect one line from the user and reply.
    RequestInput { prompt: String },
    /// The evaluation finished; the session is editing again.
    Finished,
}

/// The session state machine.
#[derive(Debug, Default)]
pub struct Session {
    history: History,
    transcript: Transcript,
    phase: Phase,
    policy: ContinuationPolicy,
    pending: Option<BlockId>,
}

impl Session {
    pub fn new(policy: ContinuationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pending_block(&self) -> Option<BlockId> {
        self.pending
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Offers the current buffer for submission.
    ///
    /// Runs the continuation classifier; on dispatch the block is frozen
    /// into the transcript (as typed), recorded in history, and the
    /// continuation policy is applied to the source sent to the runtime.
    pub fn submit(&mut self, text: &str) -> Submission {
        if self.phase != Phase::Editing {
            warn!(phase = ?self.phase, "submission while not editing rejected");
            return Submission::Rejected;
        }
        if should_continue(text) {
            return Submission::Continue;
        }
        self.phase = Phase::Submitting;
        self.history.record(text.trim_end_matches('\n'));
        let lines = text.split('\n').map(str::to_string).collect();
        let block = self.transcript.freeze(lines);
        let source = match self.policy {
            ContinuationPolicy::Preserve => text.to_string(),
            ContinuationPolicy::Strip => text.replace("\\\n", "\n"),
        };
        self.pending = Some(block);
        self.phase = Phase::Awaiting(Await::Streaming);
        debug!(%block, "block dispatched");
        Submission::Dispatch { block, source }
    }

    /// Applies one decoded host event to the session.
    pub fn on_host_event(&mut self, event: HostEvent) -> SessionAction {
        let Phase::Awaiting(_) = self.phase else {
            warn!(phase = ?self.phase, ?event, "host event outside evaluation dropped");
            return SessionAction::None;
        };
        match event {
            HostEvent::Stream { kind, text } => {
                self.transcript.append_stream(kind, &text);
                SessionAction::None
            }
            HostEvent::Debug { text } => {
                self.transcript.append_stream(StreamKind::Err, &text);
                SessionAction::None
            }
            HostEvent::InputRequest { prompt } => {
                self.phase = Phase::Awaiting(Await::InputRequested);
                SessionAction::RequestInput { prompt }
            }
            HostEvent::Final(result) => {
                if let Some(block) = self.pending.take() {
                    match result {
                        EvalResult::Value(text) => {
                            self.transcript.append_result(block, &text, ResultKind::Value);
                        }
                        EvalResult::Error(text) => {
                            self.transcript.append_result(block, &text, ResultKind::Error);
                        }
                        EvalResult::NoValue => {}
                    }
                } else {
                    warn!("final result with no pending block");
                }
                // Rendering is transient: the transcript mutation above
                // is the whole of it.
                self.phase = Phase::Rendering;
                debug!(phase = ?self.phase, "evaluation finished");
                self.phase = Phase::Editing;
                SessionAction::Finished
            }
        }
    }

    /// Notes that the pending input request was answered.
    pub fn input_replied(&mut self) {
        if self.phase == Phase::Awaiting(Await::InputRequested) {
            self.phase = Phase::Awaiting(Await::Streaming);
        } else {
            warn!(phase = ?self.phase, "input reply with no pending request");
        }
    }

    /// Recovers from a protocol failure (desync, timeout, closed channel).
    ///
    /// The failure is marked visibly in the transcript and the session
    /// returns to editing; the abandoned block keeps whatever output it
    /// already produced but never receives a result.
    pub fn fail_evaluation(&mut self, note: &str) {
        warn!(note, "evaluation abandoned");
        self.transcript.mark_protocol_failure(note);
        self.pending = None;
        self.phase = Phase::Editing;
    }
}
