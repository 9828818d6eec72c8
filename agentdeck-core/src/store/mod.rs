//! Bounded, deduplicating in-memory event stores
//!
//! Three independent collections fed by the live stream and by historical
//! REST loads:
//!
//! | Store | Key | Order | Eviction |
//! |-------|-----|-------|----------|
//! | [`ActivityStore`] | `id` (+ content fingerprint) | newest first | oldest past `max_activities` |
//! | [`AgentEventStore`] | `session_id` → `id` | newest first per session | oldest past `max_events_per_session` |
//! | [`ThoughtStore`] | `id` | oldest first (ring buffer) | oldest past `max_thoughts` |
//!
//! Every store stores an id at most once no matter how often it is delivered:
//! the same event routinely arrives twice, once from a reconnect-triggered
//! refetch and once from the socket, in either order.

mod activity;
mod agent_event;
mod thought;

pub use activity::ActivityStore;
pub use agent_event::AgentEventStore;
pub use thought::ThoughtStore;

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::StoreConfig;
use crate::types::{Activity, AgentEvent, Thought};

/// Anything stored by id and ordered by time.
pub trait Timestamped {
    fn id(&self) -> &str;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for Activity {
    fn id(&self) -> &str {
        &self.id
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for AgentEvent {
    fn id(&self) -> &str {
        &self.id
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for Thought {
    fn id(&self) -> &str {
        &self.id
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Which agent the dashboard is looking at, and which agents are archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Live,
    Archived,
}

#[derive(Debug, Default)]
pub struct ViewState {
    selected_agent: Option<String>,
    mode: ViewMode,
    archived: HashSet<String>,
}

impl ViewState {
    /// Select an agent; archived agents open in archived mode.
    pub fn select_agent(&mut self, agent_id: Option<String>) {
        self.mode = match &agent_id {
            Some(id) if self.archived.contains(id) => ViewMode::Archived,
            _ => ViewMode::Live,
        };
        self.selected_agent = agent_id;
    }

    pub fn selected_agent(&self) -> Option<&str> {
        self.selected_agent.as_deref()
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_archived(&self, agent_id: &str) -> bool {
        self.archived.contains(agent_id)
    }

    /// Record an archived agent. Returns true if it was the selected one,
    /// in which case the view switches to archived mode.
    pub fn archive(&mut self, agent_id: &str) -> bool {
        self.archived.insert(agent_id.to_string());
        let was_selected = self.selected_agent.as_deref() == Some(agent_id);
        if was_selected {
            self.mode = ViewMode::Archived;
        }
        was_selected
    }
}

/// All live state owned by one dashboard process.
///
/// Constructed once at startup and handed by reference to the connection
/// task and to the correlator.
#[derive(Debug)]
pub struct Stores {
    pub activities: ActivityStore,
    pub agent_events: AgentEventStore,
    pub thoughts: ThoughtStore,
    pub view: ViewState,
}

impl Stores {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            activities: ActivityStore::new(config.max_activities),
            agent_events: AgentEventStore::new(config.max_events_per_session),
            thoughts: ThoughtStore::new(config.max_thoughts),
            view: ViewState::default(),
        }
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

/// Stores shared between the connection task and readers.
///
/// Every holder locks only for the duration of one frame or one query.
pub type SharedStores = Arc<Mutex<Stores>>;

impl Stores {
    pub fn shared(config: &StoreConfig) -> SharedStores {
        Arc::new(Mutex::new(Self::new(config)))
    }
}

/// Lock shared stores. A panicked holder leaves every store consistent, so
/// poisoning is ignored.
pub fn lock(stores: &SharedStores) -> MutexGuard<'_, Stores> {
    stores.lock().unwrap_or_else(PoisonError::into_inner)
}
