/// Public STUN servers used when no ICE servers are configured.
pub const DEFAULT_STUN_SERVERS: [&str; 4] = [
    "stun:stun.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun.stunprotocol.org",
    "stun:stun.dienst.ist:3478",
];
