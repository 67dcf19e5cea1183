//! Wire protocol for Wavegate.
//!
//! This crate defines the "language" spoken on the gateway socket:
//!
//! - **Frames** ([`Frame`], [`OpCode`]): the `{op, d, s, t}` envelope.
//! - **Payloads** ([`Hello`], [`Identify`], [`VoiceState`], ...): the typed
//!   contents of `d` for the operations and events this library understands.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): text ↔ frame conversion.
//! - **Close codes** ([`close`]): how to react when the gateway hangs up.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (text) → Protocol (Frame) → Session (state machine, routing)
//! ```
//!
//! The protocol layer knows nothing about connections or sessions. Unknown
//! op codes and event names decode successfully; deciding what to do with
//! them is the caller's job.

pub mod close;
mod codec;
mod error;
pub mod events;
mod frame;
mod types;

pub use close::CloseDisposition;
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use frame::{Frame, OpCode};
pub use types::{
    Activity, ChannelId, ConnectionProperties, Hello, Identify, InteractionCreate, InteractionData,
    Intents, Member, MessageCreate, ParticipantId, PresenceUpdate, Ready, RequestMembers, Resume,
    RoomId, RoomSnapshot, Status, User, VoiceState, VoiceStateUpdate,
};
