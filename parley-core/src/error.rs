use thiserror::Error;

/// Structural failure while turning transport text into a [`SignalMessage`]
/// or back.
///
/// [`SignalMessage`]: crate::SignalMessage
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed signal message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("signal message has no \"type\" field")]
    MissingKind,

    #[error("unknown signal message kind \"{0}\"")]
    UnknownKind(String),

    #[error("sdp payload is not valid base64: {0}")]
    SdpBase64(#[from] base64::DecodeError),

    #[error("decoded sdp payload is not utf-8: {0}")]
    SdpUtf8(#[from] std::string::FromUtf8Error),
}

impl CodecError {
    /// Unknown kinds are dropped quietly; everything else is a parse failure.
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, CodecError::UnknownKind(_))
    }
}
