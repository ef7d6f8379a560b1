//! Effects returned by the reducer for the runtime to execute.
//!
//! The reducer only mutates state; everything that touches the protocol
//! client or the process comes back as one of these.

use ryl_core::ControlCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    /// Dispatch a frozen block to the execution host.
    Dispatch { source: String },
    /// Answer the pending input request.
    SendReply { line: String },
    /// Forward a debugger/cancellation command.
    SendControl(ControlCommand),
    /// Quit the application.
    Quit,
}
