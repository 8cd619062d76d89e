use futures::StreamExt;
use std::{
    collections::HashMap, net::SocketAddr, sync::Arc,
    time::Duration,
};
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::IntervalStream;

use axum::{
    extract::Extension,
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crevice_protocol::{BusMessage, NodeId, RoomId};

use crate::{
    bus::RelayBus,
    config::{ServerConfig, TlsConfig},
    registry::RoomRegistry,
    service::RelayService,
    websocket::Connection,
    Result,
};

pub type State = Arc<RwLock<ServerState>>;
pub(crate) type Service = Arc<RelayService>;

/// Deliver inbound bus messages to this node's local
/// participants.
async fn consume_bus(
    service: Service,
    mut queue: mpsc::UnboundedReceiver<BusMessage>,
) {
    while let Some(message) = queue.recv().await {
        if let Err(e) = service.handle_bus_message(message).await {
            tracing::warn!(error = %e, "bus fan-out failed");
        }
    }
}

/// Re-assert registry membership for every room this node
/// currently hosts a participant in.
async fn refresh_rooms(
    state: State,
    registry: Arc<dyn RoomRegistry>,
    interval_secs: u64,
) {
    let interval =
        tokio::time::interval(Duration::from_secs(interval_secs));
    let mut stream = IntervalStream::new(interval);
    while stream.next().await.is_some() {
        let (node_id, rooms): (NodeId, Vec<RoomId>) = {
            let reader = state.read().await;
            (
                reader.node_id,
                reader.rooms.keys().cloned().collect(),
            )
        };
        for room_id in rooms {
            // Transient store failures are retried on the next
            // tick; only sustained failure beyond the TTL window
            // expires the entry
            if let Err(e) =
                registry.refresh(&room_id, node_id).await
            {
                tracing::warn!(
                    room = %room_id,
                    error = %e,
                    "membership refresh failed");
            }
        }
    }
}

/// A participant connection hosted by this node.
///
/// Insertion order is preserved so the first participant of a
/// room stays addressable.
pub(crate) struct LocalParticipant {
    /// Socket connection identifier.
    pub(crate) id: Uuid,
    /// Connection handle.
    pub(crate) conn: Connection,
}

pub struct ServerState {
    /// Server config.
    pub(crate) config: ServerConfig,

    /// Identity of this node; the registry membership token and
    /// the bus queue address.
    pub(crate) node_id: NodeId,

    /// Participants connected to this node, keyed by room.
    pub(crate) rooms: HashMap<RoomId, Vec<LocalParticipant>>,
}

/// Relay web server.
pub struct RelayServer {
    state: State,
    registry: Arc<dyn RoomRegistry>,
    bus: Arc<dyn RelayBus>,
}

impl RelayServer {
    /// Create a new relay server with a fresh node identity.
    pub fn new(
        config: ServerConfig,
        registry: Arc<dyn RoomRegistry>,
        bus: Arc<dyn RelayBus>,
    ) -> Self {
        let node_id = NodeId::new();
        tracing::info!(node = %node_id, "relay node");
        Self {
            state: Arc::new(RwLock::new(ServerState {
                config,
                node_id,
                rooms: Default::default(),
            })),
            registry,
            bus,
        }
    }

    /// Start the server.
    pub async fn start(
        &self,
        addr: SocketAddr,
        handle: Handle,
    ) -> Result<()> {
        let (node_id, refresh_interval, tls) = {
            let reader = self.state.read().await;
            (
                reader.node_id,
                reader.config.room.refresh_interval,
                reader.config.tls.as_ref().cloned(),
            )
        };

        let service = Arc::new(RelayService::new(
            Arc::clone(&self.state),
            Arc::clone(&self.registry),
            Arc::clone(&self.bus),
        ));

        // Provision this node's inbound queue and drain it
        let queue = self.bus.subscribe(node_id).await?;
        tokio::task::spawn(consume_bus(
            Arc::clone(&service),
            queue,
        ));

        // Spawn task to keep registry entries alive
        tokio::task::spawn(refresh_rooms(
            Arc::clone(&self.state),
            Arc::clone(&self.registry),
            refresh_interval,
        ));

        if let Some(tls) = tls {
            self.run_tls(addr, handle, tls, service).await
        } else {
            self.run(addr, handle, service).await
        }
    }

    /// Start the server running on HTTPS.
    async fn run_tls(
        &self,
        addr: SocketAddr,
        handle: Handle,
        tls: TlsConfig,
        service: Service,
    ) -> Result<()> {
        let tls =
            RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
        let app = self.router(service).await?;
        tracing::info!("listening on {}", addr);
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }

    /// Start the server running on HTTP.
    async fn run(
        &self,
        addr: SocketAddr,
        handle: Handle,
        service: Service,
    ) -> Result<()> {
        let app = self.router(service).await?;
        tracing::info!("listening on {}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }

    async fn router(&self, service: Service) -> Result<Router> {
        let origins = {
            let reader = self.state.read().await;
            let mut origins = Vec::new();
            for url in reader.config.cors.origins.iter() {
                tracing::info!(url = %url, "cors");
                origins.push(HeaderValue::from_str(
                    url.as_str().trim_end_matches('/'),
                )?);
            }
            origins
        };

        let cors = CorsLayer::new()
            .allow_methods(vec![Method::GET])
            .allow_origin(origins);

        let mut app = Router::new()
            .route("/", get(crate::websocket::upgrade));
        app = app
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(Extension(service))
            .layer(Extension(Arc::clone(&self.state)));
        Ok(app)
    }
}
