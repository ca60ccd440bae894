pub mod client;
pub mod models;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use client::ApiClient;
pub use models::{CategoryItem, StockItem};
pub use transport::ReqwestTransport;
