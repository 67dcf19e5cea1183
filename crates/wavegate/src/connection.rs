//! One gateway connection, from Hello to close.
//!
//! The read loop waits on exactly three things: the next inbound frame,
//! an outbound frame from a [`GatewayHandle`](crate::GatewayHandle) (only
//! while `Active`), and a local disconnect. Everything slow is pushed out:
//! the heartbeat has its own task, cache writes go to the presence feed,
//! and handlers are spawned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use wavegate_heartbeat::{HeartbeatConfig, HeartbeatSupervisor};
use wavegate_protocol::close::CloseDisposition;
use wavegate_protocol::{Codec, Frame, Hello, OpCode, Ready, events};
use wavegate_session::{GatewayConfig, Session, SessionError};
use wavegate_transport::{CLOSE_NORMAL, CLOSE_RECONNECT, Connection, TransportError};

use crate::context::Context;
use crate::router::Dispatcher;
use crate::{GatewayError, GatewayHandle, RestClient};

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionEnd {
    /// A local disconnect finished; the session is `Closed`.
    Disconnected,
    /// The session is `Reconnecting`.
    Reconnect {
        /// Wait the post-invalidation delay before identifying again.
        reidentify: bool,
    },
}

/// What woke the read loop.
enum Step {
    Stop,
    Outbound(Frame),
    Inbound(Result<Option<String>, TransportError>),
}

enum Flow {
    Continue,
    /// The remote side is gone.
    Lost,
    /// We drop the connection and reconnect.
    Reconnect { reidentify: bool },
}

/// Borrowed client state for driving one connection.
pub(crate) struct Driver<'a, K> {
    pub(crate) config: &'a GatewayConfig,
    pub(crate) codec: &'a K,
    pub(crate) session: &'a mut Session,
    pub(crate) dispatcher: &'a Dispatcher,
    pub(crate) handle: &'a GatewayHandle,
    pub(crate) rest: &'a RestClient,
    pub(crate) outbound: &'a mut mpsc::UnboundedReceiver<Frame>,
    pub(crate) shutdown: &'a mut watch::Receiver<bool>,
    pub(crate) heartbeat_jitter: Duration,
}

impl<K: Codec + Clone> Driver<'_, K> {
    /// Runs the read loop until the connection ends.
    ///
    /// # Errors
    /// Fatal session errors (rejected credentials or configuration).
    pub(crate) async fn run<T: Connection>(
        mut self,
        conn: Arc<T>,
    ) -> Result<ConnectionEnd, GatewayError> {
        let conn_id = conn.id();
        tracing::info!(%conn_id, "gateway connection open");

        let mut heartbeat: Option<HeartbeatSupervisor> = None;

        let flow = loop {
            let active = self.session.state().is_active();
            let step = tokio::select! {
                biased;

                _ = self.shutdown.wait_for(|stop| *stop) => Step::Stop,
                Some(frame) = self.outbound.recv(), if active => Step::Outbound(frame),
                received = conn.recv() => Step::Inbound(received),
            };

            let flow = match step {
                Step::Stop => break None,
                Step::Outbound(frame) => match self.send(&conn, &frame).await {
                    Ok(()) => Flow::Continue,
                    Err(GatewayError::Transport(e)) => self.lost(e)?,
                    Err(e) => {
                        tracing::warn!(error = %e, op = %frame.op, "dropping unsendable frame");
                        Flow::Continue
                    }
                },
                Step::Inbound(Ok(Some(text))) => {
                    match self.on_text(&conn, &text, &mut heartbeat).await {
                        Ok(flow) => flow,
                        Err(GatewayError::Transport(e)) => self.lost(e)?,
                        Err(e) => return Err(e),
                    }
                }
                Step::Inbound(Ok(None)) => self.lost(TransportError::ConnectionClosed {
                    code: None,
                    reason: "stream ended".into(),
                })?,
                Step::Inbound(Err(e)) => self.lost(e)?,
            };
            if !matches!(flow, Flow::Continue) {
                break Some(flow);
            }
        };

        // Heartbeat first, then the transport.
        if let Some(mut heartbeat) = heartbeat.take() {
            heartbeat.stop();
        }

        match flow {
            None => {
                self.session.begin_close();
                close(&*conn, CLOSE_NORMAL).await;
                self.session.close();
                tracing::info!(%conn_id, "gateway connection closed");
                Ok(ConnectionEnd::Disconnected)
            }
            Some(Flow::Reconnect { reidentify }) => {
                close(&*conn, CLOSE_RECONNECT).await;
                Ok(ConnectionEnd::Reconnect { reidentify })
            }
            Some(Flow::Lost | Flow::Continue) => {
                Ok(ConnectionEnd::Reconnect { reidentify: false })
            }
        }
    }

    async fn on_text<T: Connection>(
        &mut self,
        conn: &Arc<T>,
        text: &str,
        heartbeat: &mut Option<HeartbeatSupervisor>,
    ) -> Result<Flow, GatewayError> {
        let frame = match self.codec.decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return Ok(Flow::Continue);
            }
        };
        tracing::trace!(op = %frame.op, seq = ?frame.seq, event = ?frame.event, "frame received");

        // The sequence number is recorded before anything looks at the frame.
        if let Some(seq) = frame.seq {
            self.session.sequence().observe(seq);
        }

        match frame.op {
            OpCode::Hello => self.on_hello(conn, &frame, heartbeat).await,
            OpCode::Dispatch => {
                self.on_dispatch(frame);
                Ok(Flow::Continue)
            }
            OpCode::HeartbeatAck => {
                if let Some(heartbeat) = heartbeat.as_ref() {
                    heartbeat.record_ack();
                }
                Ok(Flow::Continue)
            }
            OpCode::Heartbeat => {
                tracing::debug!("gateway requested a heartbeat");
                let beat = Frame::heartbeat(self.session.sequence().get());
                self.send(conn, &beat).await?;
                Ok(Flow::Continue)
            }
            OpCode::Reconnect => {
                tracing::info!("gateway requested reconnect");
                self.step(Session::on_reconnect_requested)?;
                Ok(Flow::Reconnect { reidentify: false })
            }
            OpCode::InvalidateSession => {
                let resumable = frame.payload.as_bool().unwrap_or(false);
                tracing::warn!(resumable, "gateway invalidated the session");
                self.step(|session| session.on_invalidated(resumable))?;
                if !resumable {
                    let _ = self.dispatcher.feed().clear();
                }
                Ok(Flow::Reconnect {
                    reidentify: !resumable,
                })
            }
            _ => {
                tracing::debug!(op = %frame.op, "unrecognized op code");
                let ctx = self.context();
                self.dispatcher.dispatch(&ctx, frame);
                Ok(Flow::Continue)
            }
        }
    }

    async fn on_hello<T: Connection>(
        &mut self,
        conn: &Arc<T>,
        frame: &Frame,
        heartbeat: &mut Option<HeartbeatSupervisor>,
    ) -> Result<Flow, GatewayError> {
        let hello = match frame.payload_as::<Hello>() {
            Ok(hello) if hello.heartbeat_interval > 0 => hello,
            Ok(_) => {
                tracing::warn!("hello without a heartbeat interval; reconnecting");
                self.step(Session::on_reconnect_requested)?;
                return Ok(Flow::Reconnect { reidentify: false });
            }
            Err(e) => {
                tracing::warn!(error = %e, "unusable hello; reconnecting");
                self.step(Session::on_reconnect_requested)?;
                return Ok(Flow::Reconnect { reidentify: false });
            }
        };
        let plan = match self.session.on_hello() {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unexpected hello");
                return Ok(Flow::Continue);
            }
        };

        tracing::info!(
            interval_ms = hello.heartbeat_interval,
            resume = plan.is_resume(),
            "hello received; authenticating"
        );
        // A fresh session starts from an empty cache.
        if !plan.is_resume() {
            let _ = self.dispatcher.feed().clear();
        }
        let handshake = plan.into_frame(self.config)?;
        self.send(conn, &handshake).await?;

        let sequence = self.session.sequence();
        let codec = self.codec.clone();
        let beacon_conn = Arc::clone(conn);
        let config =
            HeartbeatConfig::new(hello.interval()).with_initial_jitter(self.heartbeat_jitter);
        *heartbeat = Some(HeartbeatSupervisor::start(config, move || {
            let text = codec.encode(&Frame::heartbeat(sequence.get()));
            let conn = Arc::clone(&beacon_conn);
            async move {
                conn.send(&text?).await?;
                Ok::<(), GatewayError>(())
            }
        })?);

        Ok(Flow::Continue)
    }

    fn on_dispatch(&mut self, frame: Frame) {
        let outcome = match frame.event.as_deref() {
            Some(events::READY) => match frame.payload_as::<Ready>() {
                Ok(ready) => self.session.on_ready(&ready),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unreadable READY");
                    return;
                }
            },
            Some(events::RESUMED) => self.session.on_resumed(),
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            tracing::warn!(
                error = %e,
                event = ?frame.event,
                "session ignored out-of-order event"
            );
        }

        let ctx = self.context();
        self.dispatcher.dispatch(&ctx, frame);
    }

    /// Records a lost connection. Fatal close codes become errors; a close
    /// that forces a fresh Identify also clears the cache.
    fn lost(&mut self, error: TransportError) -> Result<Flow, GatewayError> {
        let code = error.close_code();
        let reason = match &error {
            TransportError::ConnectionClosed { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        let disposition = self.session.on_connection_lost(code, &reason)?;
        if disposition == CloseDisposition::Reidentify {
            let _ = self.dispatcher.feed().clear();
        }
        Ok(Flow::Lost)
    }

    /// Applies a session transition; illegal transitions are logged, fatal
    /// ones are returned.
    fn step(
        &mut self,
        f: impl FnOnce(&mut Session) -> Result<(), SessionError>,
    ) -> Result<(), GatewayError> {
        match f(&mut *self.session) {
            Ok(()) => Ok(()),
            Err(e @ SessionError::InvalidTransition { .. }) => {
                tracing::warn!(error = %e, "session transition skipped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send<T: Connection>(
        &self,
        conn: &Arc<T>,
        frame: &Frame,
    ) -> Result<(), GatewayError> {
        let text = self.codec.encode(frame)?;
        tracing::trace!(op = %frame.op, "frame sent");
        conn.send(&text).await?;
        Ok(())
    }

    fn context(&self) -> Context {
        Context::new(
            self.dispatcher.feed().cache().clone(),
            self.handle.clone(),
            self.rest.clone(),
            self.dispatcher.audio(),
            self.session.self_id().cloned(),
        )
    }
}

async fn close<T: Connection>(conn: &T, code: u16) {
    if let Err(e) = conn.close(code).await {
        tracing::debug!(error = %e, code, "close frame not delivered");
    }
}
