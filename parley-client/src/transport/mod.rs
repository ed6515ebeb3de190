mod outbound;
mod signal_sink;
mod transport_event;
mod ws_transport;

pub use outbound::*;
pub use signal_sink::*;
pub use transport_event::*;
pub use ws_transport::*;
