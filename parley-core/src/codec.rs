use crate::error::CodecError;
use crate::model::{SignalKind, SignalMessage};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the `sdp` field of offers and answers travels on the wire.
///
/// Both ends of a deployment must agree; the encoding is never sniffed per
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpEncoding {
    Plain,
    #[default]
    Base64,
}

impl SdpEncoding {
    pub fn encode(&self, sdp: &str) -> String {
        match self {
            SdpEncoding::Plain => sdp.to_owned(),
            SdpEncoding::Base64 => STANDARD.encode(sdp.as_bytes()),
        }
    }

    pub fn decode(&self, payload: &str) -> Result<String, CodecError> {
        match self {
            SdpEncoding::Plain => Ok(payload.to_owned()),
            SdpEncoding::Base64 => Ok(String::from_utf8(STANDARD.decode(payload)?)?),
        }
    }
}

impl FromStr for SdpEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(SdpEncoding::Plain),
            "base64" => Ok(SdpEncoding::Base64),
            other => Err(format!("unknown sdp encoding '{other}' (expected plain or base64)")),
        }
    }
}

impl fmt::Display for SdpEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpEncoding::Plain => f.write_str("plain"),
            SdpEncoding::Base64 => f.write_str("base64"),
        }
    }
}

/// JSON text codec for [`SignalMessage`], one object per transport message.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec {
    sdp_encoding: SdpEncoding,
}

impl WireCodec {
    pub fn new(sdp_encoding: SdpEncoding) -> Self {
        Self { sdp_encoding }
    }

    pub fn sdp_encoding(&self) -> SdpEncoding {
        self.sdp_encoding
    }

    pub fn encode(&self, msg: &SignalMessage) -> Result<String, CodecError> {
        if self.sdp_encoding == SdpEncoding::Plain || msg.sdp().is_none() {
            return Ok(serde_json::to_string(msg)?);
        }

        let mut wire = msg.clone();
        if let Some(sdp) = wire.sdp_mut() {
            *sdp = self.sdp_encoding.encode(sdp);
        }
        Ok(serde_json::to_string(&wire)?)
    }

    pub fn decode(&self, text: &str) -> Result<SignalMessage, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(CodecError::MissingKind)?;
        if SignalKind::from_tag(tag).is_none() {
            return Err(CodecError::UnknownKind(tag.to_owned()));
        }

        let mut msg: SignalMessage = serde_json::from_value(value)?;
        if let Some(sdp) = msg.sdp_mut() {
            *sdp = self.sdp_encoding.decode(sdp)?;
        }
        Ok(msg)
    }
}
