//! Session engine for ryl.
//!
//! Everything that is not a terminal concern lives here: the continuation
//! classifier, input history, the transcript, the worker protocol and its
//! host/client halves, the session state machine, and the built-in
//! evaluators. The TUI crate consumes these through channels and plain
//! method calls; nothing in this crate touches the terminal.

pub mod classify;
pub mod client;
pub mod config;
pub mod eval;
pub mod history;
pub mod host;
pub mod interrupt;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod transcript;

pub use client::ProtocolClient;
pub use config::Config;
pub use eval::{CommandEvaluator, EchoEvaluator};
pub use host::{EvalIo, Evaluator, WorkerHandle, WorkerHost};
pub use protocol::{
    AwakeStatus, ControlCommand, DriverMessage, EvalResult, HostEvent, HostMessage, ProtocolError,
};
pub use session::{Await, ContinuationPolicy, Phase, Session, SessionAction, Submission};
pub use transcript::{BlockId, ResultKind, StreamKind, Transcript, TranscriptItem};
