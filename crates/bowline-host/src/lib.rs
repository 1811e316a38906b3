//! Native-messaging host bridging a browser extension to the desktop
//! backend.
//!
//! The browser launches this binary and speaks length-prefixed JSON frames
//! over its stdin/stdout; the desktop backend listens on a local socket.
//! The crate wires the pieces together: the [`pump`] drives the framing
//! engine from `bowline-proto`, the [`dispatch::Dispatcher`] validates and
//! routes each request, and the [`session::Session`] keeps the backend
//! channel alive across failures and retries.

pub mod channel;
pub mod dispatch;
pub mod pump;
pub mod session;
pub mod telemetry;

pub use channel::{BackendChannel, ChannelConnector, ChannelError, SocketConnector};
pub use dispatch::Dispatcher;
pub use pump::PumpError;
pub use session::{Session, SessionStatus};
pub use telemetry::{TelemetryError, TelemetryHandle};
