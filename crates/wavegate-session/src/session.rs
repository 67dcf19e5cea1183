//! The session record: lifecycle state plus everything needed to resume.
//!
//! `Session` does no I/O. The client's connection loop reports what
//! happened (transport opened, Hello received, READY, a close code) and the
//! session answers with the next step and keeps its state consistent. State
//! changes are published on a `watch` channel so handlers can check
//! liveness without touching the loop.

use std::sync::Arc;

use tokio::sync::watch;
use wavegate_protocol::close::{self, CloseDisposition};
use wavegate_protocol::{Frame, Identify, OpCode, ParticipantId, ProtocolError, Ready, Resume};

use crate::{GatewayConfig, SequenceTracker, SessionError, SessionState};

/// What the gateway needs to continue a dropped session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeInfo {
    /// The session id from READY.
    pub session_id: String,
    /// Where READY said to reconnect for a resume.
    pub resume_url: Option<String>,
}

/// The first frame to send after Hello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakePlan {
    /// Start a fresh session.
    Identify,
    /// Continue `session_id` from `seq`.
    Resume {
        /// Session to continue.
        session_id: String,
        /// Last sequence number seen on it.
        seq: u64,
    },
}

impl HandshakePlan {
    /// Builds the Identify or Resume frame for this plan.
    pub fn into_frame(self, config: &GatewayConfig) -> Result<Frame, ProtocolError> {
        let token = config.token.expose().to_owned();
        match self {
            Self::Identify => Frame::new(
                OpCode::Identify,
                &Identify {
                    token,
                    intents: config.intents,
                    properties: config.properties.clone(),
                },
            ),
            Self::Resume { session_id, seq } => Frame::new(
                OpCode::Resume,
                &Resume {
                    token,
                    session_id,
                    seq,
                },
            ),
        }
    }

    /// `true` for [`HandshakePlan::Resume`].
    pub fn is_resume(&self) -> bool {
        matches!(self, Self::Resume { .. })
    }
}

/// One logical gateway session, across however many connections it takes.
pub struct Session {
    state: watch::Sender<SessionState>,
    sequence: Arc<SequenceTracker>,
    resume: Option<ResumeInfo>,
    self_id: Option<ParticipantId>,
    reconnect_attempts: u32,
    max_reconnect_attempts: u32,
}

impl Session {
    /// A new session in `Connecting`.
    ///
    /// `self_id` is the id decoded from the token, if any; READY replaces it.
    pub fn new(self_id: Option<ParticipantId>, max_reconnect_attempts: u32) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            state,
            sequence: Arc::new(SequenceTracker::new()),
            resume: None,
            self_id,
            reconnect_attempts: 0,
            max_reconnect_attempts,
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The sequence tracker for the current session instance.
    pub fn sequence(&self) -> Arc<SequenceTracker> {
        Arc::clone(&self.sequence)
    }

    /// The client's own participant id, if known.
    pub fn self_id(&self) -> Option<&ParticipantId> {
        self.self_id.as_ref()
    }

    /// Resume data from the last READY, if the session can be resumed.
    pub fn resume_info(&self) -> Option<&ResumeInfo> {
        self.resume.as_ref()
    }

    /// Consecutive reconnect attempts since the session was last `Active`.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// The URL the next connection should dial.
    ///
    /// A resumable session uses READY's resume URL, carrying over the query
    /// string (API version, encoding) from `gateway_url` when the resume URL
    /// has none.
    pub fn connect_url(&self, gateway_url: &str) -> String {
        let Some(resume_url) = self.resume.as_ref().and_then(|r| r.resume_url.as_deref()) else {
            return gateway_url.to_owned();
        };
        if resume_url.contains('?') {
            return resume_url.to_owned();
        }
        match gateway_url.split_once('?') {
            Some((_, query)) => {
                format!("{}/?{query}", resume_url.trim_end_matches('/'))
            }
            None => resume_url.to_owned(),
        }
    }

    /// The transport connected.
    pub fn on_transport_open(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::AwaitingHello)
    }

    /// Hello arrived: decides between Identify and Resume.
    pub fn on_hello(&mut self) -> Result<HandshakePlan, SessionError> {
        self.transition(SessionState::Identifying)?;
        let plan = match (&self.resume, self.sequence.get()) {
            (Some(resume), Some(seq)) => HandshakePlan::Resume {
                session_id: resume.session_id.clone(),
                seq,
            },
            _ => HandshakePlan::Identify,
        };
        tracing::debug!(resume = plan.is_resume(), "handshake planned");
        Ok(plan)
    }

    /// READY arrived: the session is new and `Active`.
    pub fn on_ready(&mut self, ready: &Ready) -> Result<(), SessionError> {
        self.transition(SessionState::Active)?;
        self.resume = Some(ResumeInfo {
            session_id: ready.session_id.clone(),
            resume_url: ready.resume_gateway_url.clone(),
        });
        self.self_id = Some(ready.user.id.clone());
        self.reconnect_attempts = 0;
        tracing::info!(user = %ready.user.id, "session ready");
        Ok(())
    }

    /// RESUMED arrived: the old session continues and is `Active`.
    pub fn on_resumed(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Active)?;
        self.reconnect_attempts = 0;
        tracing::info!(seq = ?self.sequence.get(), "session resumed");
        Ok(())
    }

    /// The gateway asked for a reconnect (op 7). The session stays resumable.
    pub fn on_reconnect_requested(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Reconnecting)
    }

    /// The gateway invalidated the session (op 9).
    ///
    /// A non-resumable invalidation discards the resume data and starts a
    /// new sequence, so the next handshake is a fresh Identify.
    pub fn on_invalidated(&mut self, resumable: bool) -> Result<(), SessionError> {
        if !resumable {
            self.forget_resume();
        }
        self.transition(SessionState::Reconnecting)
    }

    /// The transport ended, with the gateway's close code if there was one.
    ///
    /// Fatal codes close the session and return the matching error.
    /// Otherwise the session moves to `Reconnecting`, dropping its resume
    /// data if the code demands a fresh Identify. Outside a live state this
    /// only reports the disposition.
    pub fn on_connection_lost(
        &mut self,
        code: Option<u16>,
        reason: &str,
    ) -> Result<CloseDisposition, SessionError> {
        let disposition = close::classify(code);
        if !self.state().is_live() {
            return Ok(disposition);
        }

        match disposition {
            CloseDisposition::AuthRejected | CloseDisposition::Rejected => {
                let code = code.unwrap_or_default();
                tracing::error!(code, %reason, "gateway closed the session");
                self.close();
                let reason = reason.to_owned();
                return Err(match disposition {
                    CloseDisposition::AuthRejected => SessionError::AuthRejected { code, reason },
                    _ => SessionError::Rejected { code, reason },
                });
            }
            CloseDisposition::Reidentify => self.forget_resume(),
            CloseDisposition::Resume => {}
        }

        tracing::warn!(?code, %reason, ?disposition, "gateway connection lost");
        if self.state() != SessionState::Reconnecting {
            self.transition(SessionState::Reconnecting)?;
        }
        Ok(disposition)
    }

    /// Starts the next reconnect attempt. Returns its 1-based number.
    ///
    /// # Errors
    /// [`SessionError::ReconnectExhausted`] once the attempts since the last
    /// `Active` exceed the configured maximum; the session is then closed.
    pub fn begin_reconnect(&mut self) -> Result<u32, SessionError> {
        self.reconnect_attempts += 1;
        if self.reconnect_attempts > self.max_reconnect_attempts {
            let attempts = self.reconnect_attempts - 1;
            tracing::error!(attempts, "reconnect budget exhausted");
            self.close();
            return Err(SessionError::ReconnectExhausted { attempts });
        }
        self.transition(SessionState::Connecting)?;
        Ok(self.reconnect_attempts)
    }

    /// Connecting failed before the transport opened.
    pub fn on_connect_failed(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Reconnecting)
    }

    /// A local disconnect started.
    pub fn begin_close(&mut self) {
        if self.state().can_transition_to(SessionState::Closing) {
            self.set(SessionState::Closing);
        }
    }

    /// Moves straight to `Closed` through `Closing`.
    pub fn close(&mut self) {
        self.begin_close();
        if self.state() == SessionState::Closing {
            self.set(SessionState::Closed);
        }
    }

    fn forget_resume(&mut self) {
        if self.resume.take().is_some() {
            tracing::debug!("resume data discarded");
        }
        self.sequence = Arc::new(SequenceTracker::new());
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(SessionError::InvalidTransition { from, to: next });
        }
        self.set(next);
        Ok(())
    }

    fn set(&mut self, next: SessionState) {
        let from = self.state.send_replace(next);
        tracing::debug!(%from, to = %next, "session state changed");
    }
}
