mod room_coordinator;
mod router_command;
mod signaling_router;

pub use room_coordinator::*;
pub use router_command::*;
pub use signaling_router::*;
