pub mod channel;
pub mod hub;
pub mod state;

pub use channel::{BrokerConfig, ScanChannel};
pub use hub::ScanHub;
pub use state::{ConnectionStatus, FeedEvent, ScanEvent, ScanSnapshot};
