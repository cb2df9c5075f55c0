//! [`PollClient`] – HTTP client side of the polling transport.
//!
//! Wraps a [`reqwest::Client`] with a construction-time request timeout.
//! The control loop awaits each exchange inline, so there is never more
//! than one request in flight per unit.  Every failure mode (timeout,
//! non-success status, malformed body) surfaces as a [`TransportError`]
//! that the caller logs and absorbs; the next scheduled interval retries.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vendos_agent::poll_client::PollClient;
//!
//! # async fn poll() -> Result<(), vendos_agent::poll_client::TransportError> {
//! let client = PollClient::new("http://localhost:5000", "v1", Duration::from_secs(5))?;
//! if let Some(directive) = client.next_directive().await? {
//!     println!("start motor {}", directive.motor_id);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use vendos_types::{AckRequest, AckStatus, Directive, DirectiveResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from a poll or acknowledge exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The HTTP request failed: connect error, timeout, non-success status,
    /// or an undecodable body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response decoded but does not form a usable directive.
    #[error("unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// PollClient
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for the command queue's polling endpoints.
///
/// Construct once and reuse across control-loop iterations.
pub struct PollClient {
    base_url: String,
    unit_id: String,
    client: reqwest::Client,
}

impl PollClient {
    /// Create a client for `unit_id` against `base_url`
    /// (e.g. `"http://localhost:5000"`), with `timeout` applied to every
    /// request.
    pub fn new(
        base_url: impl Into<String>,
        unit_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            unit_id: unit_id.into(),
            client,
        })
    }

    /// The unit this client polls for.
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// Fetch the directive this unit should act on, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] on timeout, connect failure,
    /// non-success status, or undecodable body, and
    /// [`TransportError::BadResponse`] when the body decodes to a
    /// half-formed directive (one of `motor_id`/`action` null).
    pub async fn next_directive(&self) -> Result<Option<Directive>, TransportError> {
        let url = format!("{}/get_command", self.base_url);
        let response: DirectiveResponse = self
            .client
            .get(&url)
            .query(&[("unit_id", self.unit_id.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (response.motor_id, response.action) {
            (Some(motor_id), Some(action)) => {
                debug!(motor_id, "directive received");
                Ok(Some(Directive { motor_id, action }))
            }
            (None, None) => Ok(None),
            _ => Err(TransportError::BadResponse(
                "directive with mismatched motor_id/action fields".to_string(),
            )),
        }
    }

    /// Report the outcome of one dispense cycle.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] on timeout, connect failure, or
    /// non-success status.  The caller decides whether to retry.
    pub async fn acknowledge(
        &self,
        motor_id: u32,
        status: AckStatus,
    ) -> Result<(), TransportError> {
        let url = format!("{}/acknowledge", self.base_url);
        let body = AckRequest {
            unit_id: self.unit_id.clone(),
            motor_id,
            status,
        };
        self.client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        debug!(motor_id, "acknowledgment accepted");
        Ok(())
    }
}
