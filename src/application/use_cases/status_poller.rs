//! Status Poller
//!
//! Polls `GET /request/{session_id}/{seq}` at a fixed interval until the request
//! reaches a terminal state:
//! - every accepted observation goes to the single registered observer, in order
//! - `Error` rejects with the server-supplied text
//! - `Done` / `Cancelled` resolve with the final request
//! - a failed poll rejects immediately; there is no automatic resume
//!
//! The poller holds no cancellation token. Cancelling is a backend mutation whose
//! effect shows up as a `Cancelled` observation.

use crate::domain::error::{AppError, Result};
use crate::domain::request::{Request, RequestHandle, RequestStatus};
use crate::infrastructure::backend::QueryBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Receives every status observation accepted by the poller.
pub trait StatusObserver: Send {
    fn on_status(&mut self, request: &Request);
}

impl<F> StatusObserver for F
where
    F: FnMut(&Request) + Send,
{
    fn on_status(&mut self, request: &Request) {
        self(request)
    }
}

pub struct StatusPoller {
    backend: Arc<dyn QueryBackend>,
    interval: Duration,
    observer: Option<Box<dyn StatusObserver>>,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn QueryBackend>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            observer: None,
        }
    }

    /// Registers the observer. Must happen before [`StatusPoller::poll`]; only one is allowed.
    pub fn subscribe(&mut self, observer: impl StatusObserver + 'static) -> Result<()> {
        if self.observer.is_some() {
            return Err(AppError::Internal(
                "Status poller already has a subscriber".to_string(),
            ));
        }
        self.observer = Some(Box::new(observer));
        Ok(())
    }

    /// Polls until a terminal status. Consumes the poller so each one runs once.
    pub async fn poll(mut self, handle: &RequestHandle) -> Result<Request> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_status: Option<RequestStatus> = None;

        loop {
            ticker.tick().await;

            let request = self.backend.get_request(handle).await.map_err(|e| {
                warn!(error = %e, request = %handle, "Status poll failed");
                e
            })?;

            if let Some(previous) = last_status {
                if !request.status.can_follow(previous) {
                    warn!(
                        request = %handle,
                        previous = %previous,
                        observed = %request.status,
                        "Ignoring out-of-order status observation"
                    );
                    continue;
                }
            }
            last_status = Some(request.status);
            debug!(request = %handle, status = %request.status, "Status observed");

            if let Some(observer) = self.observer.as_mut() {
                observer.on_status(&request);
            }

            match request.status {
                RequestStatus::Error => {
                    let message = request.error_text();
                    warn!(request = %handle, error = %message, "Request failed on the backend");
                    return Err(AppError::ServerError(message));
                }
                RequestStatus::Done | RequestStatus::Cancelled => {
                    info!(request = %handle, status = %request.status, "Request finished");
                    return Ok(request);
                }
                _ => {}
            }
        }
    }
}
