//! The gateway session lifecycle.

use std::fmt;

/// Where a gateway session is in its lifecycle.
///
/// ```text
///  Connecting ──→ AwaitingHello ──→ Identifying ──→ Active
///      ↑               │                 │            │
///      │               ▼                 ▼            ▼
///      └──────────── Reconnecting ←──────┴────────────┘
///
///  any state ──(local disconnect / fatal close)──→ Closing ──→ Closed
/// ```
///
/// `Identifying` covers both a fresh Identify and a Resume; the handshake
/// ends in `Active` when READY or RESUMED arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Opening the transport.
    Connecting,
    /// Transport open, waiting for the gateway's Hello.
    AwaitingHello,
    /// Identify or Resume sent, waiting for READY / RESUMED.
    Identifying,
    /// Handshake complete; dispatches flow.
    Active,
    /// The connection was lost and a new one is about to be opened.
    Reconnecting,
    /// A local disconnect or fatal close is in progress.
    Closing,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Returns `true` if moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, AwaitingHello)
                | (AwaitingHello, Identifying)
                | (Identifying, Active)
                | (Connecting | AwaitingHello | Identifying | Active, Reconnecting)
                | (Reconnecting, Connecting)
                | (Closing, Closed)
        ) || (next == Closing && !matches!(self, Closing | Closed))
    }

    /// `true` until a local disconnect or a fatal close begins.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Closing | Self::Closed)
    }

    /// `true` only while dispatches are flowing.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Active => "active",
            Self::Reconnecting => "reconnecting",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
