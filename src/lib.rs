pub mod application;
pub mod domain;
pub mod infrastructure;

use application::bootstrap::init_tracing;
use application::commands::{scheduled_notification_count, today_namedays, AppState};
use infrastructure::error::InfraError;
use infrastructure::notifier::InMemoryNotifier;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs the headless backend in the current directory until Ctrl-C.
pub fn run() -> Result<(), InfraError> {
    init_tracing();
    let workspace_root = std::env::current_dir()?;
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let state = AppState::new(&workspace_root, Arc::new(InMemoryNotifier::default()))?;
        let reconciliation = state.start_reconciliation();

        match today_namedays(&state).await {
            Ok(today) => info!(
                day = today.day,
                month = today.month,
                names = today.celebrating_names.len(),
                "today's name days"
            ),
            Err(error) => warn!(error = %error, "could not load today's name days"),
        }

        tokio::signal::ctrl_c().await?;
        let pending = scheduled_notification_count(&state).await?;
        info!(pending, "shutting down");
        reconciliation.abort();
        Ok(())
    })
}
