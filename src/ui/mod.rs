pub mod categories;
pub mod login;
pub mod scanner;
pub mod stock;

pub use categories::CategoryView;
pub use login::{FormAction, LoginForm};
pub use scanner::ScannerView;
pub use stock::StockView;
