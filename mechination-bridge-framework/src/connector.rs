//! Connection attempt abstractions.
//!
//! A bridge runs as a sequence of attempts. Each attempt opens every
//! transport through a [`Connector`], drives the resulting [`Session`] until it
//! fails, and closes it before the next attempt starts. Nothing survives from
//! one attempt to the next.

use std::fmt::Display;
use std::future::Future;

/// Opens the transports of one connection attempt.
pub trait Connector {
    /// The error type shared by connecting and running.
    type Error: Display;

    /// The live transports produced by a successful connect.
    type Session: Session<Error = Self::Error>;

    /// Open all transports.
    ///
    /// If only some of them could be opened, the ones that were must be
    /// released before returning the error.
    fn connect(&mut self) -> impl Future<Output = Result<Self::Session, Self::Error>>;
}

/// The transports of one attempt while they are open.
pub trait Session {
    /// Error that ends the attempt.
    type Error: Display;

    /// Drive the transports until one of them fails.
    ///
    /// `Ok(())` means the session ended without an error. It is still
    /// followed by a reconnect.
    fn run(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Release every transport. Called exactly once, after [`run`](Self::run)
    /// returns.
    fn close(self) -> impl Future<Output = ()>;
}
