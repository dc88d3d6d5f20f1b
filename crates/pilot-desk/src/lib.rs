//! `pilot-desk` – client side of a robot control unit's Desk web interface.
//!
//! # Modules
//!
//! - [`endpoint`] – [`DeskEndpoint`] address plus the explicit [`TlsTrust`]
//!   policy shared by every connection to that Desk.
//! - [`session`] – password encoding, login and authenticated requests
//!   ([`DeskClient`], [`Session`]).
//! - [`stream`] – the navigation event stream: [`WsEventSource`] transport
//!   and the [`EventStream`] worker lifecycle.

pub mod endpoint;
pub mod session;
pub mod stream;

pub use endpoint::{DeskEndpoint, TlsTrust};
pub use session::{Credential, DeskClient, Session, authenticate, encode_password};
pub use stream::{EventSource, EventStream, Frame, StreamExit, WsEventSource, stream_request};
