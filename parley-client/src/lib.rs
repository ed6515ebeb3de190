mod config;
mod connection;
mod error;
mod session;
mod signaling;
mod transport;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
