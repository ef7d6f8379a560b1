//! Wire protocol between the session driver and the worker-hosted runtime.
//!
//! The host side sends [`HostMessage`] frames: zero or more intermediate
//! messages (`final_response: false`) followed by exactly one final message
//! per evaluation. The payload's first byte selects the lane:
//!
//! | tag   | meaning                                   |
//! |-------|-------------------------------------------|
//! | `O`   | stdout text                               |
//! | `E`   | stderr text                               |
//! | `i`   | blocking input request (prompt follows)   |
//! | `d`   | debugger event text                       |
//! | `xS…` | final: result value text                  |
//! | `xN`  | final: no displayable value               |
//! | `xR…` | final: runtime error text                 |
//!
//! Driver-to-host traffic is a [`DriverMessage`]: structurally either a
//! control word or a raw input-reply line. On the wire both are bare
//! strings disambiguated by session state; in memory they are distinct
//! variants so the two can never be confused.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Control state the runtime's blocking wait loop obeys.
///
/// Written only by the protocol layer in response to a driver command;
/// read by the runtime between checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AwakeStatus {
    #[default]
    Running = 0,
    Continue = 1,
    Traceback = 2,
    Step = 3,
    Quit = 4,
}

impl AwakeStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => AwakeStatus::Continue,
            2 => AwakeStatus::Traceback,
            3 => AwakeStatus::Step,
            4 => AwakeStatus::Quit,
            _ => AwakeStatus::Running,
        }
    }
}

/// Shared awake-status cell, one per worker.
#[derive(Debug, Clone, Default)]
pub struct AwakeCell(Arc<AtomicU8>);

impl AwakeCell {
    pub fn set(&self, status: AwakeStatus) {
        self.0.store(status as u8, Ordering::SeqCst);
    }

    pub fn get(&self) -> AwakeStatus {
        AwakeStatus::from_u8(self.0.load(Ordering::SeqCst))
    }
}

/// Debugger/cancellation command from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Continue,
    Traceback,
    Step,
    Quit,
}

impl ControlCommand {
    pub fn as_wire(self) -> &'static str {
        match self {
            ControlCommand::Continue => "continue",
            ControlCommand::Traceback => "traceback",
            ControlCommand::Step => "step",
            ControlCommand::Quit => "quit",
        }
    }

    pub fn from_wire(word: &str) -> Option<Self> {
        match word {
            "continue" => Some(ControlCommand::Continue),
            "traceback" => Some(ControlCommand::Traceback),
            "step" => Some(ControlCommand::Step),
            "quit" => Some(ControlCommand::Quit),
            _ => None,
        }
    }

    pub fn awake(self) -> AwakeStatus {
        match self {
            ControlCommand::Continue => AwakeStatus::Continue,
            ControlCommand::Traceback => AwakeStatus::Traceback,
            ControlCommand::Step => AwakeStatus::Step,
            ControlCommand::Quit => AwakeStatus::Quit,
        }
    }
}

/// Driver-to-host message.
///
/// The original wire reused one string channel for both kinds and told
/// them apart by session state alone; keeping them as distinct variants
/// makes that disambiguation explicit at the type level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverMessage {
    Control(ControlCommand),
    InputReply(String),
}

impl DriverMessage {
    /// Encodes to the bare-string wire form.
    pub fn encode(&self) -> String {
        match self {
            DriverMessage::Control(cmd) => cmd.as_wire().to_string(),
            DriverMessage::InputReply(line) => line.clone(),
        }
    }

    /// Decodes from the wire. `replying` is the session's one-shot
    /// input-reply state: while set, every string is a verbatim reply,
    /// even one that happens to spell a control word.
    pub fn decode(wire: &str, replying: bool) -> Option<Self> {
        if replying {
            return Some(DriverMessage::InputReply(wire.to_string()));
        }
        ControlCommand::from_wire(wire).map(DriverMessage::Control)
    }
}

/// Outcome of one evaluation, as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalResult {
    /// Displayable result text.
    Value(String),
    /// The evaluation produced no displayable value.
    NoValue,
    /// Runtime-reported failure, rendered as error-tagged result text.
    Error(String),
}

/// Raw host-to-driver frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMessage {
    pub callback_id: u32,
    pub final_response: bool,
    #[serde(with = "serde_bytes_vec")]
    pub payload: Vec<u8>,
}

/// Payload bytes serialize as a plain array; kept in a module so the
/// representation can change without touching the struct.
mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_seq(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(de)
    }
}

impl HostMessage {
    pub fn stream(callback_id: u32, kind: crate::transcript::StreamKind, text: &str) -> Self {
        let tag = match kind {
            crate::transcript::StreamKind::Out => b'O',
            crate::transcript::StreamKind::Err => b'E',
        };
        Self::tagged(callback_id, false, tag, text)
    }

    pub fn input_request(callback_id: u32, prompt: &str) -> Self {
        Self::tagged(callback_id, false, b'i', prompt)
    }

    pub fn debug(callback_id: u32, text: &str) -> Self {
        Self::tagged(callback_id, false, b'd', text)
    }

    pub fn final_result(callback_id: u32, result: &EvalResult) -> Self {
        let mut payload = vec![b'x'];
        match result {
            EvalResult::Value(text) => {
                payload.push(b'S');
                payload.extend_from_slice(text.as_bytes());
            }
            EvalResult::NoValue => payload.push(b'N'),
            EvalResult::Error(text) => {
                payload.push(b'R');
                payload.extend_from_slice(text.as_bytes());
            }
        }
        Self {
            callback_id,
            final_response: true,
            payload,
        }
    }

    fn tagged(callback_id: u32, final_response: bool, tag: u8, text: &str) -> Self {
        let mut payload = Vec::with_capacity(text.len() + 1);
        payload.push(tag);
        payload.extend_from_slice(text.as_bytes());
        Self {
            callback_id,
            final_response,
            payload,
        }
    }

    /// Decodes the payload lane into a [`HostEvent`].
    pub fn decode(&self) -> Result<HostEvent, ProtocolError> {
        let (&tag, rest) = self
            .payload
            .split_first()
            .ok_or_else(|| ProtocolError::UnexpectedMessage("empty payload".into()))?;
        if rest.contains(&0) {
            return Err(ProtocolError::UnexpectedMessage(
                "NUL byte in payload".into(),
            ));
        }
        let text = |bytes: &[u8]| -> Result<String, ProtocolError> {
            String::from_utf8(bytes.to_vec())
                .map_err(|_| ProtocolError::UnexpectedMessage("payload is not UTF-8".into()))
        };
        match tag {
            b'O' => Ok(HostEvent::Stream {
                kind: crate::transcript::StreamKind::Out,
                text: text(rest)?,
            }),
            b'E' => Ok(HostEvent::Stream {
                kind: crate::transcript::StreamKind::Err,
                text: text(rest)?,
            }),
            b'i' => Ok(HostEvent::InputRequest {
                prompt: text(rest)?,
            }),
            b'd' => Ok(HostEvent::Debug { text: text(rest)? }),
            b'x' => {
                if !self.final_response {
                    return Err(ProtocolError::UnexpectedMessage(
                        "final payload on an intermediate message".into(),
                    ));
                }
                let (&sub, value) = rest.split_first().ok_or_else(|| {
                    ProtocolError::UnexpectedMessage("final payload missing subtag".into())
                })?;
                match sub {
                    b'S' => Ok(HostEvent::Final(EvalResult::Value(text(value)?))),
                    b'N' => Ok(HostEvent::Final(EvalResult::NoValue)),
                    b'R' => Ok(HostEvent::Final(EvalResult::Error(text(value)?))),
                    other => Err(ProtocolError::UnexpectedMessage(format!(
                        "unknown final subtag 0x{other:02x}"
                    ))),
                }
            }
            other => Err(ProtocolError::UnexpectedMessage(format!(
                "unknown payload tag 0x{other:02x}"
            ))),
        }
    }
}

/// Decoded host-to-driver event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Stream {
        kind: crate::transcript::StreamKind,
        text: String,
    },
    /// The runtime is blocked waiting for one line of input.
    InputRequest { prompt: String },
    /// Debugger callback text (e.g. a traceback dump).
    Debug { text: String },
    /// The evaluation finished; exactly one per evaluation.
    Final(EvalResult),
}

/// Protocol-level failures. All of these are recoverable: the session
/// resets to editing and the failure is surfaced in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An evaluation is already in flight (single-flight violation).
    Busy,
    /// A message arrived that the current state cannot account for.
    UnexpectedMessage(String),
    /// No response arrived within the configured timeout.
    HostUnavailable,
    /// The worker channel closed mid-evaluation.
    ChannelClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Busy => write!(f, "an evaluation is already in flight"),
            ProtocolError::UnexpectedMessage(detail) => {
                write!(f, "protocol desync: {detail}")
            }
            ProtocolError::HostUnavailable => write!(f, "execution host is not responding"),
            ProtocolError::ChannelClosed => write!(f, "execution host channel closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
