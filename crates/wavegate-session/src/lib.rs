//! Gateway session management for Wavegate.
//!
//! This crate owns the logical session that outlives individual
//! connections:
//!
//! 1. **Lifecycle** ([`SessionState`], [`Session`]): which handshake step
//!    the client is in, and which transitions are legal
//! 2. **Resume bookkeeping** ([`SequenceTracker`], [`ResumeInfo`]): the
//!    session id and last sequence number a Resume needs
//! 3. **Configuration** ([`GatewayConfig`], [`Token`]): credentials,
//!    endpoints, intents, and the reconnect budget
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)              ← drives connections, routes events
//!     ↕
//! Session Layer (this crate)  ← decides Identify vs Resume, close handling
//!     ↕
//! Protocol Layer (below)      ← frames, payloads, close codes
//! ```

mod config;
mod error;
mod identity;
mod sequence;
mod session;
mod state;

pub use config::{
    DEFAULT_API_BASE, DEFAULT_GATEWAY_URL, DEFAULT_MAX_RECONNECT_ATTEMPTS, GatewayConfig,
    reidentify_delay,
};
pub use error::{ConfigError, SessionError};
pub use identity::Token;
pub use sequence::SequenceTracker;
pub use session::{HandshakePlan, ResumeInfo, Session};
pub use state::SessionState;
