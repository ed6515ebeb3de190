mod candidate_buffer;
mod close_signal;
mod negotiation_session;
mod session_registry;
mod session_state;
mod session_task;
mod session_view;

pub use candidate_buffer::*;
pub use close_signal::*;
pub use negotiation_session::*;
pub use session_registry::*;
pub use session_state::*;
pub use session_task::*;
pub use session_view::*;
