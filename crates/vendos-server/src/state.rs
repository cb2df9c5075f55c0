use std::sync::Arc;

use vendos_queue::{CommandStore, Inventory};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CommandStore>,
    pub inventory: Arc<dyn Inventory>,
}
