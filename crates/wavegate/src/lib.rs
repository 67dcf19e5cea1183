//! # Wavegate
//!
//! Async client for a realtime voice-chat gateway.
//!
//! Wavegate keeps one gateway session alive (identify, heartbeat, resume,
//! reconnect with backoff), maintains a live cache of who is in which
//! voice channel, and routes typed events to your handlers. Applications
//! register handlers on a [`GatewayClientBuilder`] and the client handles
//! transport, session, and cache consistency.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wavegate::prelude::*;
//!
//! # async fn demo() -> Result<(), GatewayError> {
//! let client = GatewayClient::builder(GatewayConfig::from_env()?)
//!     .on(EventKind::ParticipantUpdate, |ctx, event| async move {
//!         if let Event::ParticipantUpdate(state) = event {
//!             let Some(room) = state.guild_id else { return };
//!             let record = ctx.cache().lookup(&room, &state.user_id).await;
//!             tracing::info!(?record, "participant moved");
//!         }
//!     })
//!     .build()?;
//!
//! let handle = client.handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     handle.disconnect();
//! });
//! client.run().await
//! # }
//! ```
//!
//! Handlers for room snapshots and participant updates run only after the
//! cache reflects that event.

mod audio;
mod client;
mod connection;
mod context;
mod error;
mod handle;
mod rest;
mod router;

pub use audio::{AudioBackend, AudioError, Track, enqueue};
pub use client::{GatewayClient, GatewayClientBuilder};
pub use context::Context;
pub use error::GatewayError;
pub use handle::GatewayHandle;
pub use rest::{RestClient, RestError};
pub use router::{Event, EventKind, EventRouter, Handler};

pub use wavegate_heartbeat as heartbeat;
pub use wavegate_presence as presence;
pub use wavegate_protocol as protocol;
pub use wavegate_session as session;
pub use wavegate_transport as transport;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::{
        AudioBackend, Context, Event, EventKind, EventRouter, GatewayClient,
        GatewayClientBuilder, GatewayError, GatewayHandle, RestClient,
    };
    pub use wavegate_presence::{ParticipantCache, ParticipantRecord};
    pub use wavegate_protocol::{
        Activity, ChannelId, Intents, ParticipantId, PresenceUpdate, RoomId, Status,
    };
    pub use wavegate_session::{GatewayConfig, SessionState, Token};
}
