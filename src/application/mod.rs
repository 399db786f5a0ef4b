pub mod use_cases;

pub use use_cases::grid_fetcher::{
    FetchKey, GridSnapshot, InfiniteGridFetcher, PageLoad, PageOutcome, ScrollPosition,
};
pub use use_cases::request_protocol::RequestProtocolClient;
pub use use_cases::section_model::{messages_from_requests, SectionModel};
pub use use_cases::session_controller::{SessionController, SubmitOutcome};
pub use use_cases::sort_deriver::{build_refs, derive_sort, resolve_column, try_derive_sort};
pub use use_cases::status_poller::{StatusObserver, StatusPoller};
