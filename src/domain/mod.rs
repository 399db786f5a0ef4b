pub mod config;
pub mod error;
pub mod query;
pub mod request;
pub mod section;
pub mod selection;
pub mod session;
pub mod sort;
