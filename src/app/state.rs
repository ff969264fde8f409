//! Application state shared by every match the process hosts

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::{GameMatch, MatchController, MatchError, MatchHandle, MatchRegistry};
use crate::protocol::MatchResults;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_registry: Arc<MatchRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            match_registry: Arc::new(MatchRegistry::new()),
        }
    }

    /// Spawn a match task between two participants
    ///
    /// The handle stays in the registry until the task finishes.
    pub fn start_match(
        &self,
        participant_a: Uuid,
        participant_b: Uuid,
    ) -> (MatchHandle, JoinHandle<Result<MatchResults, MatchError>>) {
        let match_id = Uuid::new_v4();
        let controller =
            MatchController::new(match_id, participant_a, participant_b, self.config.matches.clone());
        let (game_match, handle) = GameMatch::new(controller);

        self.match_registry.insert(handle.clone());
        info!(
            match_id = %match_id,
            participant_a = %participant_a,
            participant_b = %participant_b,
            "Created new match"
        );

        let registry = self.match_registry.clone();
        let task = tokio::spawn(async move {
            let results = game_match.run().await;

            registry.remove(&match_id);
            match &results {
                Ok(results) => info!(
                    match_id = %match_id,
                    outcome = ?results.outcome,
                    "Match removed from registry"
                ),
                Err(err) => warn!(match_id = %match_id, error = %err, "Match ended without results"),
            }
            results
        });

        (handle, task)
    }
}
