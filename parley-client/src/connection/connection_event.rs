use crate::session::ConnectionState;
use parley_core::CandidateDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IceGatheringState {
    #[default]
    New,
    Gathering,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IceConnectionState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Signals a connection object reports to the session that owns it.
///
/// Delivered in order on the session's event channel instead of mutating
/// session state from callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A locally gathered candidate; `None` marks the end of gathering.
    LocalCandidate(Option<CandidateDescriptor>),
    StateChanged(ConnectionState),
    IceGatheringStateChanged(IceGatheringState),
    IceConnectionStateChanged(IceConnectionState),
    DataChannelOpen(String),
}
