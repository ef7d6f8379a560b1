//! Interactive terminal front-end for ryl.
//!
//! Elm-shaped: [`update::update`] is a pure reducer over [`state::AppState`]
//! producing [`effects::UiEffect`]s; [`runtime::TuiRuntime`] owns the
//! terminal and the protocol client and executes those effects.

pub mod editor;
pub mod effects;
pub mod events;
pub mod render;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod update;

pub use runtime::TuiRuntime;
