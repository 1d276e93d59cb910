pub mod api;
pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod models;
pub mod utils;
pub mod widgets;

pub use bus::{EventBus, WidgetEvent};
pub use error::{Error, Result};
pub use host::WidgetHost;
