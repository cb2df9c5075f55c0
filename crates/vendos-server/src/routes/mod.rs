pub mod purchase;
pub mod transport;

/// GET /healthz — liveness probe.
pub async fn healthz() -> &'static str {
    "ok"
}
