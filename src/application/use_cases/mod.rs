pub mod grid_fetcher;
pub mod request_protocol;
pub mod section_model;
pub mod session_controller;
pub mod sort_deriver;
pub mod status_poller;
