pub use parley_core::model::{PeerId, RoomId};
pub use parley_core::{SdpEncoding, WireCodec};

pub mod model {
    pub use parley_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use parley_client::*;
}
