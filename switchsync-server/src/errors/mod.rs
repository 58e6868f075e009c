pub mod connection;
pub mod session;
pub mod settings;

pub use connection::ConnectionError;
pub use session::SessionError;
pub use settings::SettingsError;
