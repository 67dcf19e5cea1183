//! What a handler gets to work with.

use std::fmt;
use std::sync::Arc;

use wavegate_presence::ParticipantCache;
use wavegate_protocol::ParticipantId;

use crate::{AudioBackend, GatewayHandle, RestClient};

/// Handler context: the participant cache, the outbound handle, the REST
/// client, the audio backend (if any), and the client's own id.
///
/// Cheap to clone. Handlers run concurrently with the read loop and may
/// outlive the session; check [`Context::is_live`] before acting on a
/// session that might be closing.
#[derive(Clone)]
pub struct Context {
    cache: ParticipantCache,
    handle: GatewayHandle,
    rest: RestClient,
    audio: Option<Arc<dyn AudioBackend>>,
    self_id: Option<ParticipantId>,
}

impl Context {
    pub(crate) fn new(
        cache: ParticipantCache,
        handle: GatewayHandle,
        rest: RestClient,
        audio: Option<Arc<dyn AudioBackend>>,
        self_id: Option<ParticipantId>,
    ) -> Self {
        Self {
            cache,
            handle,
            rest,
            audio,
            self_id,
        }
    }

    /// The participant cache.
    pub fn cache(&self) -> &ParticipantCache {
        &self.cache
    }

    /// Sends room joins, presence updates, and member requests; requests
    /// disconnect.
    pub fn handle(&self) -> &GatewayHandle {
        &self.handle
    }

    /// The REST client.
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// The audio backend, if one was configured.
    pub fn audio(&self) -> Option<&dyn AudioBackend> {
        self.audio.as_deref()
    }

    /// The client's own participant id, once known.
    pub fn self_id(&self) -> Option<&ParticipantId> {
        self.self_id.as_ref()
    }

    /// `false` once the session has started closing.
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("self_id", &self.self_id)
            .field("state", &self.handle.state())
            .field("audio", &self.audio.is_some())
            .finish()
    }
}
