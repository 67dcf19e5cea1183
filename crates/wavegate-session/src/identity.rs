//! The bot credential and what can be read from it without a network call.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use wavegate_protocol::ParticipantId;

/// A gateway credential.
///
/// The raw value is only reachable through [`Token::expose`]; `Debug`
/// prints `[REDACTED]` so the token cannot leak through a log line or a
/// `{:?}` of the config that contains it.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wraps a raw token. A leading `Bot ` prefix is stripped.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        let token = trimmed.strip_prefix("Bot ").unwrap_or(trimmed);
        Self(token.to_owned())
    }

    /// Returns the raw token for Identify, Resume, and REST headers.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Decodes the client's own participant id from the token.
    ///
    /// Bot tokens are three dot-separated segments; the first is the bot's
    /// user id, base64-encoded. Returns `None` when the token does not have
    /// that shape. READY carries the authoritative id and replaces this one.
    pub fn self_id(&self) -> Option<ParticipantId> {
        let segment = self.0.split('.').next()?.trim_end_matches('=');
        if segment.is_empty() {
            return None;
        }
        let bytes = STANDARD_NO_PAD
            .decode(segment)
            .or_else(|_| URL_SAFE_NO_PAD.decode(segment))
            .ok()?;
        let id = String::from_utf8(bytes).ok()?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(ParticipantId(id))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token([REDACTED])")
    }
}
