use serde::{Deserialize, Serialize};

/// ICE candidate as exchanged over signaling, in the `RTCIceCandidateInit`
/// JSON shape browsers produce with `candidate.toJSON()`.
///
/// The value is carried as a whole; nothing beyond its structure is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescriptor {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        default,
        rename = "sdpMLineIndex",
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl CandidateDescriptor {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    pub fn with_mid(mut self, sdp_mid: impl Into<String>, sdp_m_line_index: u16) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self.sdp_m_line_index = Some(sdp_m_line_index);
        self
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod rtc {
    use super::CandidateDescriptor;
    use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

    impl From<RTCIceCandidateInit> for CandidateDescriptor {
        fn from(init: RTCIceCandidateInit) -> Self {
            Self {
                candidate: init.candidate,
                sdp_mid: init.sdp_mid,
                sdp_m_line_index: init.sdp_mline_index,
                username_fragment: init.username_fragment,
            }
        }
    }

    impl From<CandidateDescriptor> for RTCIceCandidateInit {
        fn from(desc: CandidateDescriptor) -> Self {
            RTCIceCandidateInit {
                candidate: desc.candidate,
                sdp_mid: desc.sdp_mid,
                sdp_mline_index: desc.sdp_m_line_index,
                username_fragment: desc.username_fragment,
            }
        }
    }
}
