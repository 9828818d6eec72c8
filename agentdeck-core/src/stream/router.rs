//! Applies decoded envelopes to the stores.

use crate::store::Stores;

use super::envelope::{Envelope, Payload};

/// Notification for collaborators that cache server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The live stream (re)opened; historical data may be missing events
    StreamOpened { reconnect: bool },
    /// The chat message list should be refetched
    MessagesStale,
    /// The session list should be refetched
    SessionsStale,
    /// An agent moved to the archived set
    AgentArchived { agent_id: String, was_selected: bool },
}

/// Route one envelope into the stores.
///
/// Every envelope also lands in the activity feed. Returns the signal the
/// envelope raises, if any.
pub fn dispatch(stores: &mut Stores, envelope: Envelope) -> Option<Signal> {
    let added = stores.activities.add(envelope.to_activity());
    tracing::trace!(kind = %envelope.kind, added, "Dispatching stream event");

    match envelope.payload {
        Payload::ToolEvent(event) => {
            stores.agent_events.add(event);
            None
        }
        Payload::Thought(thought) => {
            stores.thoughts.add(thought);
            None
        }
        Payload::MessagesStale => Some(Signal::MessagesStale),
        Payload::SessionsStale => Some(Signal::SessionsStale),
        Payload::AgentArchived { agent_id } => {
            let was_selected = stores.view.archive(&agent_id);
            tracing::info!(agent_id = %agent_id, was_selected, "Agent archived");
            Some(Signal::AgentArchived {
                agent_id,
                was_selected,
            })
        }
        Payload::FeedOnly => None,
    }
}
