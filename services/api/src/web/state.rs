//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use chrono::Duration;
use research_copilot_core::ports::{Clock, KeyValueStore, PaymentGateway, ResearchService};
use research_copilot_core::{Accounts, Billing, Repository, ResearchDesk};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: Accounts,
    pub desk: ResearchDesk,
    /// `None` when no payment gateway is configured.
    pub billing: Option<Billing>,
}

impl AppState {
    /// Wires the core services onto the given adapters.
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn KeyValueStore>,
        research: Arc<dyn ResearchService>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let repo = Repository::new(store);
        let deadline = Duration::from_std(config.query_timeout).unwrap_or(Duration::seconds(120));

        Self {
            accounts: Accounts::new(
                repo.clone(),
                clock.clone(),
                Duration::days(config.session_ttl_days),
            ),
            desk: ResearchDesk::new(repo.clone(), research, clock.clone(), deadline),
            billing: gateway.map(|gateway| Billing::new(repo, gateway, clock)),
            config,
        }
    }
}
