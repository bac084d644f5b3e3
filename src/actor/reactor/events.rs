//! Per-event handlers. Each one mutates the reactor for exactly one kind of
//! event and leaves protocol publishing to the reactor.

pub mod command;
pub mod drag;
pub mod protocol;
pub mod window;
