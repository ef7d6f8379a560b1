//! Built-in evaluators.
//!
//! `ryl` has no embedded language runtime; out of the box each block is
//! piped to a configured interpreter command. The echo evaluator exists
//! for `--echo` mode and tests.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::host::{EvalIo, Evaluator};
use crate::protocol::{AwakeStatus, EvalResult};
use crate::transcript::StreamKind;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pipes each submitted block to an interpreter subprocess.
///
/// A fresh process is spawned per evaluation; the block is written to its
/// stdin and both output streams are forwarded line by line as they
/// arrive. A `Quit` control kills the process. A non-zero exit status
/// becomes a runtime error result.
pub struct CommandEvaluator {
    command: String,
}

impl CommandEvaluator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn run(&self, source: &str, io: &mut dyn EvalIo) -> Result<EvalResult> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("TERM", "dumb")
            .env("NO_COLOR", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn runtime command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .context("failed to write block to runtime stdin")?;
            // Dropping stdin closes it so line-oriented runtimes see EOF.
        }

        let (line_tx, line_rx) = mpsc::channel::<(StreamKind, String)>();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, StreamKind::Out, line_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, StreamKind::Err, line_tx.clone());
        }
        drop(line_tx);

        loop {
            while let Ok((kind, text)) = line_rx.try_recv() {
                io.emit(kind, &text);
            }
            if io.awake() == AwakeStatus::Quit {
                debug!("quit requested, killing runtime process");
                let _ = child.kill();
                let _ = child.wait();
                return Ok(EvalResult::Error("evaluation interrupted".to_string()));
            }
            if let Some(status) = child.try_wait().context("failed to poll runtime process")? {
                // Reader threads drop their senders at EOF.
                while let Ok((kind, text)) = line_rx.recv() {
                    io.emit(kind, &text);
                }
                return Ok(if status.success() {
                    EvalResult::NoValue
                } else {
                    EvalResult::Error(format!("runtime exited with {status}"))
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&mut self, source: &str, io: &mut dyn EvalIo) -> EvalResult {
        match self.run(source, io) {
            Ok(result) => result,
            Err(err) => EvalResult::Error(format!("{err:#}")),
        }
    }
}

fn spawn_line_reader(
    stream: impl std::io::Read + Send + 'static,
    kind: StreamKind,
    tx: mpsc::Sender<(StreamKind, String)>,
) {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send((kind, format!("{line}\n"))).is_err() {
                break;
            }
        }
    });
}

/// Echoes each block back as both stream output and the result value.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoEvaluator;

impl Evaluator for EchoEvaluator {
    fn evaluate(&mut self, source: &str, io: &mut dyn EvalIo) -> EvalResult {
        io.emit(StreamKind::Out, source);
        EvalResult::Value(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingIo {
        emitted: Vec<(StreamKind, String)>,
        awake: AwakeStatus,
    }

    impl EvalIo for RecordingIo {
        fn emit(&mut self, kind: StreamKind, text: &str) {
            self.emitted.push((kind, text.to_string()));
        }

        fn request_input(&mut self, _prompt: &str) -> Option<String> {
            None
        }

        fn awake(&self) -> AwakeStatus {
            self.awake
        }
    }

    #[test]
    fn command_evaluator_streams_stdout() {
        let mut eval = CommandEvaluator::new("cat");
        let mut io = RecordingIo::default();
        let result = eval.evaluate("hello\n", &mut io);
        assert_eq!(result, EvalResult::NoValue);
        assert_eq!(io.emitted, [(StreamKind::Out, "hello\n".to_string())]);
    }

    #[test]
    fn command_evaluator_streams_stderr() {
        let mut eval = CommandEvaluator::new("cat 1>&2");
        let mut io = RecordingIo::default();
        let result = eval.evaluate("oops\n", &mut io);
        assert_eq!(result, EvalResult::NoValue);
        assert_eq!(io.emitted, [(StreamKind::Err, "oops\n".to_string())]);
    }

    #[test]
    fn non_zero_exit_is_a_runtime_error() {
        let mut eval = CommandEvaluator::new("exit 3");
        let mut io = RecordingIo::default();
        let result = eval.evaluate("", &mut io);
        assert!(matches!(result, EvalResult::Error(ref text) if text.contains("3")));
    }

    #[test]
    fn missing_interpreter_reports_an_error() {
        // `sh -c` itself runs; the failure surfaces as a non-zero exit.
        let mut eval = CommandEvaluator::new("definitely-not-a-real-binary-ryl");
        let mut io = RecordingIo::default();
        assert!(matches!(eval.evaluate("", &mut io), EvalResult::Error(_)));
    }

    #[test]
    fn quit_kills_a_stuck_process() {
        let mut eval = CommandEvaluator::new("sleep 30");
        let mut io = RecordingIo {
            awake: AwakeStatus::Quit,
            ..RecordingIo::default()
        };
        let started = std::time::Instant::now();
        let result = eval.evaluate("", &mut io);
        assert!(matches!(result, EvalResult::Error(ref text) if text.contains("interrupted")));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn echo_evaluator_round_trips() {
        let mut eval = EchoEvaluator;
        let mut io = RecordingIo::default();
        let result = eval.evaluate("1+1", &mut io);
        assert_eq!(result, EvalResult::Value("1+1".into()));
        assert_eq!(io.emitted, [(StreamKind::Out, "1+1".to_string())]);
    }
}
