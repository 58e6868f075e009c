pub mod message;
pub mod models;
pub mod protocols;

pub use message::{Action, Message};
pub use models::*;
pub use protocols::Error as CodecError;
