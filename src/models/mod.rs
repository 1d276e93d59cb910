pub mod collection;
pub mod rate;

pub use collection::CurrentCollection;
pub use rate::{format_rate, ExchangeRate};
