//! Events fed into the reducer.

use ryl_core::HostEvent;

/// Everything the runtime can feed into [`crate::update::update`].
#[derive(Debug)]
pub enum UiEvent {
    /// Raw terminal input (keys, paste, resize).
    Terminal(crossterm::event::Event),
    /// Decoded message from the execution host.
    Host(HostEvent),
    /// The evaluation broke (timeout, desync, closed channel); the
    /// runtime has already abandoned it on the protocol client.
    HostFailure { note: String },
    /// Ctrl+C was pressed.
    Interrupted,
    Tick,
}
