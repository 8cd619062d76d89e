use crevice_protocol::NodeId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors generated by the relay server.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated when a path is expected to be a file.
    #[error("path {0} is not a file")]
    NotFile(PathBuf),

    /// Error generated when a config file has no parent directory.
    #[error("could not determine config parent directory")]
    NoParentDir,

    /// Error generated when the room TTL does not leave enough
    /// headroom over the refresh interval.
    #[error("room ttl must be at least twice the refresh interval")]
    RoomTtlConfig,

    /// Error generated when the outgoing channel for a socket
    /// has been closed.
    #[error("websocket channel closed")]
    ChannelClosed,

    /// Error generated when publishing to a node without a
    /// provisioned bus queue.
    #[error("no bus queue for node {0}")]
    BusTargetUnknown(NodeId),

    /// Error generated when a bus queue receiver has gone away.
    #[error("bus queue closed")]
    BusClosed,

    /// Error generated by input/output.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error generated parsing TOML.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Error generated serializing or deserializing JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error generated by the protocol library.
    #[error(transparent)]
    Protocol(#[from] crevice_protocol::Error),

    /// Error generated converting CORS origins to header values.
    #[error(transparent)]
    InvalidHeader(
        #[from] axum::http::header::InvalidHeaderValue,
    ),

    /// Error generated by the websocket transport.
    #[error(transparent)]
    Axum(#[from] axum::Error),
}
