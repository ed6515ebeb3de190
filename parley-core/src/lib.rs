pub mod codec;
pub mod error;
pub mod model;
pub mod utils;

pub use codec::{SdpEncoding, WireCodec};
pub use error::CodecError;
pub use model::*;
