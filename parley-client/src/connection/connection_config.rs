use parley_core::IceServerConfig;
use parley_core::utils::DEFAULT_STUN_SERVERS;
use serde::{Deserialize, Serialize};

/// ICE configuration for newly created connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl ConnectionConfig {
    /// Host candidates only; used for loopback tests.
    pub fn without_ice_servers() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
                username: None,
                credential: None,
            }],
        }
    }
}
