mod candidate;
mod peer;
mod room;
mod signaling;

pub use candidate::CandidateDescriptor;
pub use peer::PeerId;
pub use room::RoomId;
pub use signaling::{IceServerConfig, SignalKind, SignalMessage};
