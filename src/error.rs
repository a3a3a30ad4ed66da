use thiserror::Error;

/// Errors from the remote tile-server client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Operation attempted before a successful `connect`
    #[error("not connected")]
    NotConnected,

    /// Server rejected the request signature (HTTP 401)
    #[error("authentication failed")]
    AuthDenied,

    /// Slide or tile does not exist on the server (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-2xx response
    #[error("status {0}")]
    Status(u16),

    /// Connection or timeout failure from the transport
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not match the expected wire shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from slide sources (local pyramid reader or remote client)
#[derive(Debug, Error)]
pub enum SourceError {
    /// Level index outside `0..level_count`
    #[error("invalid level {level}: slide has {count} levels")]
    InvalidLevel { level: i32, count: i32 },

    /// Region with non-positive dimensions or outside the slide
    #[error("malformed region: {0}")]
    InvalidRegion(String),

    /// Operation on a source that failed to open or went invalid
    #[error("source is not valid: {0}")]
    State(String),

    /// Pixel data could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Error from the remote client
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Errors when loading segmentation overlay files
#[derive(Debug, Error)]
pub enum LoadError {
    /// File could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protobuf payload failed to decode
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// Neither schema version yielded a usable tile list
    #[error("unrecognized segmentation schema")]
    UnknownSchema,

    /// zlib or zstd stream failed to decompress
    #[error("decompression error: {0}")]
    Decompress(String),

    /// Blob decoded but its layout is inconsistent
    #[error("malformed blob: {0}")]
    MalformedBlob(String),
}
