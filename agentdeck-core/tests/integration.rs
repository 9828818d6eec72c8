//! Integration tests for the connection task
//!
//! The task is driven through an in-memory connector so frames, closes and
//! reconnect timers can be scripted with paused tokio time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentdeck_core::config::{ConnectionConfig, StoreConfig};
use agentdeck_core::connection::{
    self, ConnectionHandle, ConnectionStatus, Connector, LinkEvent, LinkEventKind, LinkHandle,
};
use agentdeck_core::store::{self, SharedStores, Stores};
use agentdeck_core::stream::{Signal, PONG};
use tokio::sync::mpsc;

const TOOL_EVENT: &str = r#"{"event":"agent_event","data":{"id":"ev-1","event_type":"PostToolUse","session_id":"sess-1","agent_id":"worker-1","tool_name":"Read","tool_input":{"file_path":"src/lib.rs"},"timestamp":"2025-03-01T12:00:00Z"},"timestamp":"2025-03-01T12:00:00Z"}"#;
const THOUGHT: &str = r#"{"event":"agent_thought","data":{"agent_name":"worker-1","thought_type":"reasoning","content":"Read the exports first","timestamp":"2025-03-01T11:59:59Z"},"timestamp":"2025-03-01T11:59:59Z"}"#;

// ============================================
// Fake transport
// ============================================

struct FakeLink {
    link: u64,
    events: mpsc::UnboundedSender<LinkEvent>,
    outbound: Option<mpsc::UnboundedReceiver<String>>,
}

#[derive(Clone, Default)]
struct FakeConnector {
    links: Arc<Mutex<Vec<FakeLink>>>,
}

impl Connector for FakeConnector {
    fn open(&self, link: u64, events: mpsc::UnboundedSender<LinkEvent>) -> LinkHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.links.lock().unwrap().push(FakeLink {
            link,
            events,
            outbound: Some(rx),
        });
        LinkHandle::new(tx)
    }
}

/// Server side of one fake link.
struct Remote {
    link: u64,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl Remote {
    fn send(&self, kind: LinkEventKind) {
        self.events.send(LinkEvent::new(self.link, kind)).unwrap();
    }

    fn open(&self) {
        self.send(LinkEventKind::Opened);
    }

    fn frame(&self, text: &str) {
        self.send(LinkEventKind::Frame(text.to_string()));
    }

    fn close(&self) {
        self.send(LinkEventKind::Closed(Some("connection reset".to_string())));
    }
}

impl FakeConnector {
    fn opened(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    fn remote(&self, index: usize) -> Remote {
        let links = self.links.lock().unwrap();
        let link = &links[index];
        Remote {
            link: link.link,
            events: link.events.clone(),
        }
    }

    fn take_outbound(&self, index: usize) -> mpsc::UnboundedReceiver<String> {
        self.links.lock().unwrap()[index].outbound.take().unwrap()
    }
}

fn start() -> (FakeConnector, SharedStores, ConnectionHandle) {
    agentdeck_core::logging::init_test();
    let fake = FakeConnector::default();
    let stores = Stores::shared(&StoreConfig::default());
    let handle = connection::spawn(fake.clone(), stores.clone(), &ConnectionConfig::default());
    (fake, stores, handle)
}

/// Let the connection task drain its queues without advancing time.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn reconnecting(attempt: u32, secs: u64) -> ConnectionStatus {
    ConnectionStatus::Reconnecting {
        attempt,
        retry_in: Duration::from_secs(secs),
    }
}

// ============================================
// Heartbeat
// ============================================

#[tokio::test(start_paused = true)]
async fn ping_is_answered_and_not_stored() {
    let (fake, stores, handle) = start();
    handle.connect();
    settle().await;
    assert_eq!(fake.opened(), 1);

    let remote = fake.remote(0);
    let mut outbound = fake.take_outbound(0);
    remote.open();
    settle().await;
    assert_eq!(handle.status(), ConnectionStatus::Connected);

    remote.frame(r#"{"event":"ping"}"#);
    settle().await;
    assert_eq!(outbound.try_recv().unwrap(), PONG);
    assert!(store::lock(&stores).activities.is_empty());

    handle.shutdown().await;
    assert!(outbound.try_recv().is_err());
}

// ============================================
// Dedup across reconnects
// ============================================

#[tokio::test(start_paused = true)]
async fn redelivery_after_reconnect_is_stored_once() {
    let (fake, stores, handle) = start();
    let mut signals = handle.subscribe();

    handle.connect();
    settle().await;
    let first = fake.remote(0);
    first.open();
    first.frame(TOOL_EVENT);
    first.frame(THOUGHT);
    settle().await;
    assert_eq!(
        signals.try_recv().unwrap(),
        Signal::StreamOpened { reconnect: false }
    );

    first.close();
    settle().await;
    assert_eq!(handle.status(), reconnecting(1, 1));

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(fake.opened(), 2);

    let second = fake.remote(1);
    second.open();
    second.frame(TOOL_EVENT);
    second.frame(THOUGHT);
    // Late frame from the dead link is ignored
    first.frame(r#"{"event":"message_sent","data":{"id":"late"},"timestamp":"2025-03-01T12:00:05Z"}"#);
    settle().await;
    assert_eq!(
        signals.try_recv().unwrap(),
        Signal::StreamOpened { reconnect: true }
    );

    {
        let stores = store::lock(&stores);
        assert_eq!(stores.agent_events.events_for_session("sess-1").count(), 1);
        assert_eq!(stores.thoughts.len(), 1);
        assert_eq!(stores.activities.len(), 2);
        assert!(!stores.activities.contains("late"));
    }
    handle.shutdown().await;
}

// ============================================
// Backoff
// ============================================

#[tokio::test(start_paused = true)]
async fn backoff_grows_until_open_then_resets() {
    let (fake, _stores, handle) = start();
    handle.connect();
    settle().await;

    fake.remote(0).close();
    settle().await;
    assert_eq!(handle.status(), reconnecting(1, 1));

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(fake.opened(), 2);
    fake.remote(1).close();
    settle().await;
    assert_eq!(handle.status(), reconnecting(2, 2));

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(fake.opened(), 2, "second retry must wait the full 2s");

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(fake.opened(), 3);

    fake.remote(2).open();
    settle().await;
    assert_eq!(handle.status(), ConnectionStatus::Connected);

    fake.remote(2).close();
    settle().await;
    assert_eq!(handle.status(), reconnecting(1, 1));
    handle.shutdown().await;
}

// ============================================
// Cancellation
// ============================================

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let (fake, _stores, handle) = start();
    handle.connect();
    settle().await;
    fake.remote(0).open();
    fake.remote(0).close();
    settle().await;
    assert_eq!(handle.status(), reconnecting(1, 1));

    handle.disconnect();
    settle().await;
    assert_eq!(handle.status(), ConnectionStatus::Disconnected);

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(fake.opened(), 1);

    handle.connect();
    handle.connect();
    settle().await;
    assert_eq!(fake.opened(), 2);

    fake.remote(1).close();
    settle().await;
    assert_eq!(handle.status(), reconnecting(1, 1));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_closes_open_link() {
    let (fake, _stores, handle) = start();
    handle.connect();
    settle().await;
    let mut outbound = fake.take_outbound(0);
    fake.remote(0).open();
    settle().await;

    handle.disconnect();
    settle().await;
    assert!(matches!(
        outbound.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));

    // The dropped link reporting its close schedules nothing
    fake.remote(0).close();
    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(fake.opened(), 1);
    assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    handle.shutdown().await;
}

// ============================================
// Malformed input
// ============================================

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped() {
    let (fake, stores, handle) = start();
    let mut signals = handle.subscribe();
    handle.connect();
    settle().await;
    let remote = fake.remote(0);
    remote.open();

    remote.frame("{not json");
    remote.frame(r#"{"event":"mystery","data":{}}"#);
    remote.frame(r#"{"event":"agent_event","data":{"session_id":"no-type"}}"#);
    remote.frame(r#"{"event":"agent_archived","data":{"agent_id":"worker-9"},"timestamp":"2025-03-01T12:00:00Z"}"#);
    settle().await;

    assert_eq!(handle.status(), ConnectionStatus::Connected);
    assert_eq!(
        signals.try_recv().unwrap(),
        Signal::StreamOpened { reconnect: false }
    );
    assert_eq!(
        signals.try_recv().unwrap(),
        Signal::AgentArchived {
            agent_id: "worker-9".to_string(),
            was_selected: false,
        }
    );

    let stores = store::lock(&stores);
    assert_eq!(stores.activities.len(), 1);
    assert!(stores.view.is_archived("worker-9"));
    drop(stores);
    handle.shutdown().await;
}
