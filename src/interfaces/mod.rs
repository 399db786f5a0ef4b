pub mod navigation;

pub use navigation::{LoggingNavigator, SessionNavigator};
