use crate::client::{io_core, tls};
use crate::config::{ClientConfig, Transport};
use crate::message::{InboundResponse, OutboundPayload};
use crate::{oneshot_debug, oneshot_info, oneshot_warn};
use bytes::Bytes;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use rustls::pki_types::ServerName;
use uuid::Uuid;
use crate::client::error::{ClientError, Phase};
use crate::client::io_core::Connection;

/// Connect, send one payload, read one response, close.
///
/// The connection lives only inside [`OneShotClient::exchange`]; every exit
/// path, including cancellation of the future, drops and thereby closes it.
pub struct OneShotClient {
    id: Uuid,
    cfg: ClientConfig,
}

impl OneShotClient {
    pub fn new(cfg: ClientConfig) -> Self {
        Self { id: Uuid::new_v4(), cfg }
    }

    #[inline] pub fn id(&self) -> Uuid                 { self.id }
    #[inline] pub fn config(&self) -> &ClientConfig    { &self.cfg }

    /// Runs the exchange and decodes the reply as UTF-8.
    pub async fn run(&self, payload: &OutboundPayload) -> Result<InboundResponse, ClientError> {
        let bytes = self.exchange(payload).await?;
        InboundResponse::decode(&bytes).map_err(|source| {
            oneshot_warn!("[{}] Response from {} is not UTF-8", self.id, self.cfg.target());
            ClientError::Decode { target: self.target_label(), source }
        })
    }

    /// Runs the exchange on a private current-thread runtime, blocking the caller.
    /// Must not be called from inside another tokio runtime.
    pub fn run_blocking(&self, payload: &OutboundPayload) -> Result<InboundResponse, ClientError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.run(payload))
    }

    /// Same as [`run`](Self::run) without the UTF-8 step.
    pub async fn exchange(&self, payload: &OutboundPayload) -> Result<Bytes, ClientError> {
        self.cfg.validate()?;
        let target = self.cfg.target();

        // TLS material is prepared before any packet leaves the host
        let tls = match (target.transport(), self.cfg.trust()) {
            (Transport::Tls, Some(trust)) => Some((
                tls::connector(trust).await?,
                tls::server_name(target, trust)?,
            )),
            _ => None,
        };

        let stream = self.open().await?;
        let mut conn = match tls {
            Some((connector, name)) => self.handshake(connector, name, stream).await?,
            None => Connection::Plain(stream),
        };

        oneshot_debug!("[{}] Sending {} bytes to {}", self.id, payload.len(), target);
        self.bounded(Phase::Write, self.cfg.io_timeout(), io_core::write_payload(&mut conn, payload.as_bytes()))
            .await?
            .map_err(|source| ClientError::Write { target: self.target_label(), source })?;

        let response = self
            .bounded(
                Phase::Read,
                self.cfg.io_timeout(),
                io_core::read_response(&mut conn, self.cfg.read_mode(), self.cfg.max_response_bytes()),
            )
            .await?
            .map_err(|source| ClientError::Read { target: self.target_label(), source })?;
        oneshot_debug!("[{}] Received {} bytes from {}", self.id, response.len(), target);

        conn.close().await;
        Ok(response)
    }

    async fn open(&self) -> Result<TcpStream, ClientError> {
        let target = self.cfg.target();
        oneshot_debug!("[{}] Connecting to {}", self.id, target);

        // An expired connect deadline is still a connect failure, carried as TimedOut
        let stream = match self
            .bounded(Phase::Connect, self.cfg.connect_timeout(), TcpStream::connect((target.host(), target.port())))
            .await
        {
            Ok(connected) => connected,
            Err(ClientError::Timeout { after, .. }) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no connection within {after:?}"),
            )),
            Err(e) => return Err(e),
        }
        .map_err(|source| ClientError::Connect { target: self.target_label(), source })?;

        if self.cfg.no_delay() {
            if let Err(e) = stream.set_nodelay(true) {
                oneshot_warn!("Failed to set TCP_NODELAY: {:?}", e);
            }
        }

        oneshot_info!("[{}] Connected to {}", self.id, target);
        Ok(stream)
    }

    async fn handshake(
        &self,
        connector: TlsConnector,
        name: ServerName<'static>,
        stream: TcpStream,
    ) -> Result<Connection, ClientError> {
        oneshot_debug!("[{}] TLS handshake with {} as {:?}", self.id, self.cfg.target(), name);

        let tls = self
            .bounded(Phase::Handshake, self.cfg.connect_timeout(), connector.connect(name, stream))
            .await?
            .map_err(|source| ClientError::TlsHandshake { target: self.target_label(), source })?;

        let (_, session) = tls.get_ref();
        oneshot_info!(
            "[{}] TLS established, protocol version: {:?}, cipher suite: {:?}",
            self.id,
            session.protocol_version(),
            session.negotiated_cipher_suite().map(|s| s.suite())
        );
        Ok(Connection::Tls(Box::new(tls)))
    }

    /// Applies an optional deadline; `None` waits as long as the OS does.
    async fn bounded<T, F>(&self, phase: Phase, limit: Option<Duration>, fut: F) -> Result<io::Result<T>, ClientError>
    where
        F: Future<Output = io::Result<T>>,
    {
        match limit {
            Some(after) => tokio::time::timeout(after, fut).await.map_err(|_| {
                oneshot_warn!("[{}] {} with {} timed out after {:?}", self.id, phase, self.cfg.target(), after);
                ClientError::Timeout { target: self.target_label(), phase, after }
            }),
            None => Ok(fut.await),
        }
    }

    fn target_label(&self) -> String {
        self.cfg.target().to_string()
    }
}
