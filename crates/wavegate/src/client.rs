//! `GatewayClient` builder and reconnect loop.
//!
//! This is the entry point for running a gateway session. It ties together
//! all the layers: transport → protocol → session → heartbeat → presence.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use wavegate_presence::{ParticipantCache, spawn_feed};
use wavegate_protocol::{Frame, JsonCodec};
use wavegate_session::{GatewayConfig, Session, SessionState, reidentify_delay};
use wavegate_transport::{Connector, WebSocketConnector};

use crate::connection::{ConnectionEnd, Driver};
use crate::router::{Dispatcher, Event, EventKind, EventRouter};
use crate::{AudioBackend, Context, GatewayError, GatewayHandle, RestClient};

/// Builder for configuring a [`GatewayClient`].
///
/// # Example
///
/// ```rust,no_run
/// use wavegate::prelude::*;
///
/// # async fn demo() -> Result<(), GatewayError> {
/// let config = GatewayConfig::from_env()?;
/// let client = GatewayClient::builder(config)
///     .on(EventKind::Ready, |ctx, _event| async move {
///         tracing::info!(me = ?ctx.self_id(), "ready");
///     })
///     .build()?;
/// client.run().await
/// # }
/// ```
pub struct GatewayClientBuilder<C: Connector = WebSocketConnector> {
    config: GatewayConfig,
    connector: C,
    router: EventRouter,
    audio: Option<Arc<dyn AudioBackend>>,
    heartbeat_jitter: Duration,
}

impl GatewayClientBuilder<WebSocketConnector> {
    /// Creates a builder that connects over WebSocket.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            connector: WebSocketConnector::new(),
            router: EventRouter::new(),
            audio: None,
            heartbeat_jitter: Duration::ZERO,
        }
    }
}

impl<C: Connector> GatewayClientBuilder<C> {
    /// Replaces the transport.
    pub fn connector<C2: Connector>(self, connector: C2) -> GatewayClientBuilder<C2> {
        GatewayClientBuilder {
            config: self.config,
            connector,
            router: self.router,
            audio: self.audio,
            heartbeat_jitter: self.heartbeat_jitter,
        }
    }

    /// Registers a handler for one kind of event.
    pub fn on<F, Fut>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.router.register(kind, handler);
        self
    }

    /// Uses a prepared router instead of registering handlers one by one.
    pub fn router(mut self, router: EventRouter) -> Self {
        self.router = router;
        self
    }

    /// Sets the audio backend that receives voice updates.
    pub fn audio_backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.audio = Some(backend);
        self
    }

    /// Caps the random delay before the first heartbeat of each
    /// connection. Zero (the default) beats exactly one interval after Hello.
    pub fn heartbeat_jitter(mut self, jitter: Duration) -> Self {
        self.heartbeat_jitter = jitter;
        self
    }

    /// Builds the client. Nothing connects until [`GatewayClient::run`].
    ///
    /// # Errors
    /// [`GatewayError::Rest`] if the token cannot be used as a header value.
    pub fn build(self) -> Result<GatewayClient<C>, GatewayError> {
        let rest = RestClient::new(&self.config)?;
        let session = Session::new(self.config.token.self_id(), self.config.max_reconnect_attempts);
        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown) = watch::channel(false);
        let handle = GatewayHandle::new(outbound_tx, Arc::new(shutdown_tx), session.subscribe());

        Ok(GatewayClient {
            config: self.config,
            connector: self.connector,
            router: Arc::new(self.router),
            audio: self.audio,
            heartbeat_jitter: self.heartbeat_jitter,
            session,
            handle,
            rest,
            cache: ParticipantCache::new(),
            outbound,
            shutdown,
        })
    }
}

/// A gateway client that has not started yet.
///
/// Take a [`handle`](Self::handle) and a [`cache`](Self::cache) before
/// calling [`run`](Self::run); both stay valid for the life of the session.
pub struct GatewayClient<C: Connector = WebSocketConnector> {
    config: GatewayConfig,
    connector: C,
    router: Arc<EventRouter>,
    audio: Option<Arc<dyn AudioBackend>>,
    heartbeat_jitter: Duration,
    session: Session,
    handle: GatewayHandle,
    rest: RestClient,
    cache: ParticipantCache,
    outbound: mpsc::UnboundedReceiver<Frame>,
    shutdown: watch::Receiver<bool>,
}

impl GatewayClient<WebSocketConnector> {
    /// Creates a new builder.
    pub fn builder(config: GatewayConfig) -> GatewayClientBuilder<WebSocketConnector> {
        GatewayClientBuilder::new(config)
    }
}

impl<C: Connector> GatewayClient<C> {
    /// The outbound handle.
    pub fn handle(&self) -> GatewayHandle {
        self.handle.clone()
    }

    /// The participant cache this client keeps current.
    pub fn cache(&self) -> ParticipantCache {
        self.cache.clone()
    }

    /// The current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Connects and keeps the session alive until a local disconnect or a
    /// fatal error.
    ///
    /// Lost connections are resumed when the session allows it and
    /// re-identified otherwise, with capped exponential backoff between
    /// attempts.
    ///
    /// # Errors
    /// - [`SessionError::AuthRejected`](wavegate_session::SessionError::AuthRejected)
    ///   or [`SessionError::Rejected`](wavegate_session::SessionError::Rejected)
    ///   when the gateway refuses the session.
    /// - [`SessionError::ReconnectExhausted`](wavegate_session::SessionError::ReconnectExhausted)
    ///   when the reconnect budget runs out.
    ///
    /// The session is `Closed` whenever this returns.
    pub async fn run(self) -> Result<(), GatewayError> {
        let GatewayClient {
            config,
            connector,
            router,
            audio,
            heartbeat_jitter,
            mut session,
            handle,
            rest,
            cache,
            mut outbound,
            mut shutdown,
        } = self;

        let dispatcher = Dispatcher::new(router, spawn_feed(cache), audio);
        let codec = JsonCodec;
        tracing::info!(gateway = %config.gateway_url, "gateway client running");

        loop {
            let url = session.connect_url(&config.gateway_url);
            tracing::debug!(%url, "connecting");

            let connected = tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => {
                    session.close();
                    return Ok(());
                }
                result = connector.connect(&url) => result,
            };

            let end = match connected {
                Ok(conn) => {
                    session.on_transport_open()?;
                    let driver = Driver {
                        config: &config,
                        codec: &codec,
                        session: &mut session,
                        dispatcher: &dispatcher,
                        handle: &handle,
                        rest: &rest,
                        outbound: &mut outbound,
                        shutdown: &mut shutdown,
                        heartbeat_jitter,
                    };
                    match driver.run(Arc::new(conn)).await {
                        Ok(end) => end,
                        Err(e) => {
                            session.close();
                            return Err(e);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "gateway connect failed");
                    session.on_connect_failed()?;
                    ConnectionEnd::Reconnect { reidentify: false }
                }
            };

            let reidentify = match end {
                ConnectionEnd::Disconnected => return Ok(()),
                ConnectionEnd::Reconnect { reidentify } => reidentify,
            };

            let attempt = session.begin_reconnect()?;
            let delay = if reidentify {
                reidentify_delay()
            } else {
                config.reconnect_delay(attempt)
            };
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");

            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => {
                    session.close();
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
