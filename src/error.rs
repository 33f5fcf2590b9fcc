use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unknown telemetry channel: {0}")]
    UnknownChannel(String),

    #[error("Malformed topic: {0}")]
    MalformedTopic(String),

    #[error("{field} out of range: {value}")]
    Validation { field: &'static str, value: f64 },

    #[error("Unrecognized status value: {0}")]
    UnrecognizedStatus(String),

    #[error("Invalid broker address: {0}")]
    InvalidBroker(String),

    #[error("Internal channel closed")]
    ChannelClosed,

    #[error("Invalid URL")]
    UrlParseError(#[from] url::ParseError),
}
