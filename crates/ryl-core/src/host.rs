//! Worker side of the execution protocol.
//!
//! The evaluator runs on its own dedicated thread, mirroring the isolation
//! the protocol was designed around: the runtime may block for seconds (or
//! forever, pending a `Quit`) without wedging the driver. All traffic in
//! and out of the thread goes through channels; the only shared state is
//! the [`AwakeCell`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::protocol::{
    AwakeCell, AwakeStatus, ControlCommand, DriverMessage, EvalResult, HostMessage,
};
use crate::transcript::StreamKind;

/// How often a blocked input-request wait re-checks the awake cell.
const REPLY_POLL: Duration = Duration::from_millis(10);

/// I/O surface handed to an evaluator for the duration of one evaluation.
pub trait EvalIo {
    /// Emits incremental stdout/stderr text.
    fn emit(&mut self, kind: StreamKind, text: &str);

    /// Blocks until the driver answers the prompt with one line, or
    /// returns `None` if the driver went away.
    fn request_input(&mut self, prompt: &str) -> Option<String>;

    /// Current control state. Long-running evaluators should poll this at
    /// checkpoints and wind down when it reads [`AwakeStatus::Quit`].
    fn awake(&self) -> AwakeStatus;
}

/// An external runtime that can evaluate one source block at a time.
pub trait Evaluator: Send + 'static {
    fn evaluate(&mut self, source: &str, io: &mut dyn EvalIo) -> EvalResult;
}

/// Spawns evaluators onto worker threads.
pub struct WorkerHost;

impl WorkerHost {
    /// Starts `evaluator` on a dedicated thread and returns the handle the
    /// driver talks to it through. The thread exits when the handle is
    /// dropped and the current evaluation (if any) winds down.
    pub fn spawn(evaluator: impl Evaluator) -> WorkerHandle {
        let (request_tx, request_rx) = std_mpsc::channel::<(u32, String)>();
        let (reply_tx, reply_rx) = std_mpsc::channel::<String>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<HostMessage>();
        let awake = AwakeCell::default();

        let worker_awake = awake.clone();
        thread::Builder::new()
            .name("ryl-worker".to_string())
            .spawn(move || {
                worker_loop(evaluator, &request_rx, reply_rx, &event_tx, &worker_awake);
            })
            .map_or_else(
                |err| error!(%err, "failed to spawn worker thread"),
                |_| debug!("worker thread started"),
            );

        WorkerHandle {
            next_callback: 1,
            requests: request_tx,
            replies: reply_tx,
            awake,
            events: event_rx,
        }
    }
}

/// Driver-side handle to a worker thread.
pub struct WorkerHandle {
    next_callback: u32,
    requests: std_mpsc::Sender<(u32, String)>,
    /// Carries wire-encoded driver messages answering input requests.
    replies: std_mpsc::Sender<String>,
    awake: AwakeCell,
    events: mpsc::UnboundedReceiver<HostMessage>,
}

impl WorkerHandle {
    /// Queues one source block for evaluation and returns the callback id
    /// its messages will carry. Single-flight discipline is the client's
    /// job; the handle itself only fails when the worker thread is gone.
    pub fn submit(&mut self, source: &str) -> Result<u32, crate::protocol::ProtocolError> {
        let callback_id = self.next_callback;
        self.requests
            .send((callback_id, source.to_string()))
            .map_err(|_| crate::protocol::ProtocolError::ChannelClosed)?;
        self.next_callback += 1;
        Ok(callback_id)
    }

    /// Publishes a control command to the worker's awake cell. Control
    /// words cross the boundary in their wire form; a command takes
    /// effect at the evaluator's next checkpoint, best effort.
    pub fn send_control(&self, cmd: ControlCommand) {
        let wire = DriverMessage::Control(cmd).encode();
        // Control does not ride the reply channel: the cell must be
        // visible mid-evaluation, while the channel only drains at an
        // input request. The wire string is still the interface.
        if let Some(DriverMessage::Control(cmd)) = DriverMessage::decode(&wire, false) {
            self.awake.set(cmd.awake());
        }
    }

    /// Answers a pending input request with one verbatim line.
    pub fn send_reply(&self, line: &str) -> Result<(), crate::protocol::ProtocolError> {
        self.replies
            .send(DriverMessage::InputReply(line.to_string()).encode())
            .map_err(|_| crate::protocol::ProtocolError::ChannelClosed)
    }

    /// Host-to-driver message stream: zero or more intermediate messages,
    /// then exactly one final per submitted evaluation.
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<HostMessage> {
        &mut self.events
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Unstick an evaluator mid-checkpoint; the closed channels finish
        // the job once it yields.
        self.awake.set(AwakeStatus::Quit);
    }
}

struct WorkerIo<'a> {
    callback_id: u32,
    events: &'a mpsc::UnboundedSender<HostMessage>,
    replies: &'a std_mpsc::Receiver<String>,
    awake: &'a AwakeCell,
}

impl EvalIo for WorkerIo<'_> {
    fn emit(&mut self, kind: StreamKind, text: &str) {
        let _ = self.events.send(HostMessage::stream(self.callback_id, kind, text));
    }

    fn request_input(&mut self, prompt: &str) -> Option<String> {
        self.events
            .send(HostMessage::input_request(self.callback_id, prompt))
            .ok()?;
        // The reply wait is itself a quit checkpoint: an abandoned input
        // request must not leave the worker parked here while later
        // submissions queue behind it.
        loop {
            if self.awake.get() == AwakeStatus::Quit {
                return None;
            }
            match self.replies.recv_timeout(REPLY_POLL) {
                Ok(wire) => {
                    return match DriverMessage::decode(&wire, true) {
                        Some(DriverMessage::InputReply(line)) => Some(line),
                        _ => None,
                    };
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn awake(&self) -> AwakeStatus {
        self.awake.get()
    }
}

fn worker_loop(
    mut evaluator: impl Evaluator,
    requests: &std_mpsc::Receiver<(u32, String)>,
    replies: std_mpsc::Receiver<String>,
    events: &mpsc::UnboundedSender<HostMessage>,
    awake: &AwakeCell,
) {
    while let Ok((callback_id, source)) = requests.recv() {
        let mut io = WorkerIo {
            callback_id,
            events,
            replies: &replies,
            awake,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            evaluator.evaluate(&source, &mut io)
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "evaluator panicked".to_string());
                error!(callback_id, %detail, "evaluator panicked");
                EvalResult::Error(detail)
            }
        };
        // Stale replies must not leak into the next evaluation's prompt.
        while replies.try_recv().is_ok() {}
        awake.set(AwakeStatus::Running);
        if events
            .send(HostMessage::final_result(callback_id, &result))
            .is_err()
        {
            break;
        }
    }
    debug!("worker thread exiting");
}
