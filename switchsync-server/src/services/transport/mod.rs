mod connection;
mod connector;
mod dispatch;

pub use connection::{Connection, ConnectionCallback, ConnectionState, MAX_FRAME_LEN};
pub use connector::{Acceptor, Connector};
pub use dispatch::{Dispatcher, MessageObserver};
