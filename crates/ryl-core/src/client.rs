//! Driver side of the execution protocol.
//!
//! [`ProtocolClient`] wraps a [`WorkerHandle`] and enforces the rules the
//! raw channels cannot: one evaluation in flight at a time, one
//! outstanding input reply, callback-id matching, and the response
//! timeout. State here shadows the session's phase machine deliberately:
//! the client protects the wire even if a front-end drives it wrong.

use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::host::WorkerHandle;
use crate::protocol::{ControlCommand, HostEvent, HostMessage, ProtocolError};

/// Protocol-enforcing wrapper around a worker handle.
pub struct ProtocolClient {
    handle: WorkerHandle,
    /// Callback id of the evaluation in flight, if any.
    current: Option<u32>,
    replying: bool,
}

impl ProtocolClient {
    pub fn new(handle: WorkerHandle) -> Self {
        Self {
            handle,
            current: None,
            replying: false,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.current.is_some()
    }

    /// Dispatches one evaluation. Rejected with [`ProtocolError::Busy`]
    /// while a previous evaluation has not produced its final message.
    pub fn begin(&mut self, source: &str) -> Result<(), ProtocolError> {
        if self.current.is_some() {
            return Err(ProtocolError::Busy);
        }
        let callback_id = self.handle.submit(source)?;
        self.current = Some(callback_id);
        self.replying = false;
        Ok(())
    }

    /// Waits for the next host event, up to `wait`.
    ///
    /// Timeout expiry yields [`ProtocolError::HostUnavailable`]; a decode
    /// failure yields [`ProtocolError::UnexpectedMessage`]. Either way the
    /// caller should [`abandon`](Self::abandon) the evaluation and
    /// recover. Messages left over from an abandoned evaluation carry an
    /// older callback id and are skipped.
    pub async fn next_event(&mut self, wait: Duration) -> Result<HostEvent, ProtocolError> {
        let current = self
            .current
            .ok_or_else(|| ProtocolError::UnexpectedMessage("no evaluation in flight".into()))?;
        let deadline = Instant::now() + wait;
        loop {
            let message = timeout_at(deadline, self.handle.events().recv())
                .await
                .map_err(|_| ProtocolError::HostUnavailable)?
                .ok_or(ProtocolError::ChannelClosed)?;
            if let Some(event) = self.accept(current, &message)? {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant for frame loops: returns `Ok(None)` when no
    /// message is queued.
    pub fn try_next_event(&mut self) -> Result<Option<HostEvent>, ProtocolError> {
        let Some(current) = self.current else {
            return Ok(None);
        };
        loop {
            let message = match self.handle.events().try_recv() {
                Ok(message) => message,
                Err(tokio::sync::mpsc::error::TryRecvError::Empty) => return Ok(None),
                Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => {
                    return Err(ProtocolError::ChannelClosed);
                }
            };
            if let Some(event) = self.accept(current, &message)? {
                return Ok(Some(event));
            }
        }
    }

    /// Validates one raw message against the in-flight evaluation.
    /// `Ok(None)` means a stale message was skipped.
    fn accept(
        &mut self,
        current: u32,
        message: &HostMessage,
    ) -> Result<Option<HostEvent>, ProtocolError> {
        if message.callback_id < current {
            // Leftover from an abandoned evaluation.
            debug!(
                stale = message.callback_id,
                current, "stale host message skipped"
            );
            return Ok(None);
        }
        if message.callback_id > current {
            return Err(ProtocolError::UnexpectedMessage(format!(
                "callback id {} is ahead of in-flight id {current}",
                message.callback_id
            )));
        }
        let event = message.decode()?;
        match &event {
            HostEvent::InputRequest { .. } => self.replying = true,
            HostEvent::Final(_) => {
                self.current = None;
                self.replying = false;
            }
            HostEvent::Stream { .. } | HostEvent::Debug { .. } => {}
        }
        Ok(Some(event))
    }

    /// Answers the pending input request. Only legal between an
    /// `InputRequest` event and the next event.
    pub fn send_reply(&mut self, line: &str) -> Result<(), ProtocolError> {
        if !self.replying {
            return Err(ProtocolError::UnexpectedMessage(
                "no input request pending".into(),
            ));
        }
        self.handle.send_reply(line)?;
        self.replying = false;
        Ok(())
    }

    /// Forwards a control command to the running evaluation. Out-of-turn
    /// commands are logged and dropped, never fatal.
    pub fn send_control(&self, cmd: ControlCommand) {
        if self.current.is_none() {
            warn!(?cmd, "control command while idle dropped");
            return;
        }
        self.handle.send_control(cmd);
    }

    /// Gives up on the in-flight evaluation after a desync or timeout.
    ///
    /// The worker is asked to quit at its next checkpoint; the client
    /// immediately returns to the idle state so the session can recover.
    /// Whatever the abandoned evaluation still emits is skipped by the
    /// callback-id check.
    pub fn abandon(&mut self) {
        if self.current.is_some() {
            self.handle.send_control(ControlCommand::Quit);
        }
        self.current = None;
        self.replying = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{EvalIo, Evaluator, WorkerHost};
    use crate::protocol::EvalResult;
    use crate::transcript::StreamKind;

    const WAIT: Duration = Duration::from_secs(5);

    struct Scripted<F>(F);

    impl<F> Evaluator for Scripted<F>
    where
        F: FnMut(&str, &mut dyn EvalIo) -> EvalResult + Send + 'static,
    {
        fn evaluate(&mut self, source: &str, io: &mut dyn EvalIo) -> EvalResult {
            (self.0)(source, io)
        }
    }

    fn client(
        f: impl FnMut(&str, &mut dyn EvalIo) -> EvalResult + Send + 'static,
    ) -> ProtocolClient {
        ProtocolClient::new(WorkerHost::spawn(Scripted(f)))
    }

    #[tokio::test]
    async fn begin_while_awaiting_is_busy() {
        let mut client = client(|_, _| {
            std::thread::sleep(Duration::from_millis(50));
            EvalResult::NoValue
        });
        client.begin("first").unwrap();
        assert_eq!(client.begin("second"), Err(ProtocolError::Busy));
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::Final(EvalResult::NoValue))
        );
        // Idle again after the final message.
        client.begin("third").unwrap();
    }

    #[tokio::test]
    async fn slow_host_times_out_and_recovers() {
        let mut client = client(|source, io| {
            if source == "spin" {
                while io.awake() != crate::protocol::AwakeStatus::Quit {
                    std::thread::sleep(Duration::from_millis(1));
                }
                return EvalResult::Error("interrupted".into());
            }
            EvalResult::Value(source.to_string())
        });
        client.begin("spin").unwrap();
        assert_eq!(
            client.next_event(Duration::from_millis(20)).await,
            Err(ProtocolError::HostUnavailable)
        );
        client.abandon();
        assert!(!client.in_flight());
        // The abandoned evaluation's late final is skipped, not
        // misattributed to the new one.
        client.begin("again").unwrap();
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::Final(EvalResult::Value("again".into())))
        );
    }

    #[tokio::test]
    async fn reply_is_rejected_without_a_pending_request() {
        let mut client = client(|_, _| EvalResult::NoValue);
        assert!(matches!(
            client.send_reply("hello"),
            Err(ProtocolError::UnexpectedMessage(_))
        ));
    }

    #[tokio::test]
    async fn input_request_reply_completes_the_evaluation() {
        let mut client = client(|_, io: &mut dyn EvalIo| match io.request_input("? ") {
            Some(line) => EvalResult::Value(line),
            None => EvalResult::Error("no reply".into()),
        });
        client.begin("input()").unwrap();
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::InputRequest { prompt: "? ".into() })
        );
        client.send_reply("42").unwrap();
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::Final(EvalResult::Value("42".into())))
        );
    }

    #[tokio::test]
    async fn abandon_during_input_request_frees_the_worker() {
        let mut client = client(|source, io: &mut dyn EvalIo| {
            if source == "input()" {
                return match io.request_input("? ") {
                    Some(line) => EvalResult::Value(line),
                    None => EvalResult::Error("no reply".into()),
                };
            }
            EvalResult::Value(source.to_string())
        });
        client.begin("input()").unwrap();
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::InputRequest { prompt: "? ".into() })
        );
        client.abandon();
        assert!(!client.in_flight());
        // The worker notices the quit while parked on the reply wait; the
        // next evaluation runs instead of queueing behind it forever.
        client.begin("1+1").unwrap();
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::Final(EvalResult::Value("1+1".into())))
        );
    }

    #[tokio::test]
    async fn stream_events_pass_through_in_order() {
        let mut client = client(|_, io: &mut dyn EvalIo| {
            io.emit(StreamKind::Out, "a");
            io.emit(StreamKind::Err, "b");
            EvalResult::NoValue
        });
        client.begin("x").unwrap();
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::Stream {
                kind: StreamKind::Out,
                text: "a".into()
            })
        );
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::Stream {
                kind: StreamKind::Err,
                text: "b".into()
            })
        );
        assert_eq!(
            client.next_event(WAIT).await,
            Ok(HostEvent::Final(EvalResult::NoValue))
        );
    }

    #[tokio::test]
    async fn control_while_idle_is_dropped() {
        let client = client(|_, _| EvalResult::NoValue);
        // Logged and ignored; must not panic or poison the client.
        client.send_control(ControlCommand::Quit);
    }
}
