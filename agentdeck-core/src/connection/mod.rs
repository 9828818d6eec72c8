//! Connection Manager
//!
//! Owns the single live link to the dashboard's event stream. A background
//! task selects over three inputs:
//!
//! - commands from the [`ConnectionHandle`] (connect, disconnect, shutdown)
//! - events from the current link (opened, text frame, closed)
//! - the pending reconnect timer, if any
//!
//! Lifecycle decisions are made by the pure [`Supervisor`]; the task only
//! performs the actions it returns. Decoded frames are dispatched into the
//! shared stores and heartbeat probes are answered on the same link.

mod backoff;
mod state;
mod transport;

pub use backoff::Backoff;
pub use state::{Action, ConnectionStatus, Supervisor};
pub use transport::{Connector, LinkEvent, LinkEventKind, LinkHandle, WsConnector};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ConnectionConfig;
use crate::store::{self, SharedStores};
use crate::stream::{self, Inbound, Signal, PONG};

const SIGNAL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Connect,
    Disconnect,
    Shutdown,
}

/// Control surface of a running connection task.
#[derive(Debug)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    signals: broadcast::Sender<Signal>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Open the link. A no-op while connected or connecting.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Close the link and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Disconnect and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Connection task ended abnormally");
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Subscribe to cache-invalidation and lifecycle signals.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }
}

/// Spawn the connection task. It stays idle until [`ConnectionHandle::connect`].
pub fn spawn<C: Connector>(
    connector: C,
    stores: SharedStores,
    config: &ConnectionConfig,
) -> ConnectionHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
    let (signals_tx, _) = broadcast::channel(SIGNAL_CAPACITY);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let task = ConnectionTask {
        connector,
        supervisor: Supervisor::new(Backoff::from_config(config)),
        stores,
        link: None,
        timer: None,
        events_tx,
        status: status_tx,
        signals: signals_tx.clone(),
    };
    let task = tokio::spawn(task.run(commands_rx, events_rx));

    ConnectionHandle {
        commands: commands_tx,
        status: status_rx,
        signals: signals_tx,
        task,
    }
}

struct ConnectionTask<C> {
    connector: C,
    supervisor: Supervisor,
    stores: SharedStores,
    link: Option<LinkHandle>,
    /// Pending reconnect: timer token and deadline
    timer: Option<(u64, Instant)>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    status: watch::Sender<ConnectionStatus>,
    signals: broadcast::Sender<Signal>,
}

impl<C: Connector> ConnectionTask<C> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<LinkEvent>,
    ) {
        loop {
            let deadline = self.timer.map(|(_, at)| at);
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect) => {
                        let action = self.supervisor.connect();
                        self.apply(action);
                    }
                    Some(Command::Disconnect) => {
                        tracing::info!("Disconnecting from event stream");
                        let action = self.supervisor.disconnect();
                        self.apply(action);
                        self.timer = None;
                    }
                    Some(Command::Shutdown) | None => {
                        let action = self.supervisor.disconnect();
                        self.apply(action);
                        self.publish_status();
                        break;
                    }
                },
                Some(event) = events.recv() => self.on_link_event(event),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some((token, _)) = self.timer.take() {
                        let action = self.supervisor.on_timer(token);
                        self.apply(action);
                    }
                }
            }
            self.publish_status();
        }
        tracing::debug!("Connection task stopped");
    }

    fn apply(&mut self, action: Option<Action>) {
        let Some(action) = action else {
            return;
        };
        match action {
            Action::Open { link } => {
                tracing::debug!(link, "Opening link");
                self.timer = None;
                self.link = Some(self.connector.open(link, self.events_tx.clone()));
            }
            Action::Close => {
                self.link = None;
            }
            Action::Schedule { token, delay } => {
                tracing::info!(
                    attempt = self.supervisor.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.timer = Some((token, Instant::now() + delay));
            }
            Action::Opened { reconnect } => {
                tracing::info!(reconnect, "Event stream connected");
                let _ = self.signals.send(Signal::StreamOpened { reconnect });
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        if !self.supervisor.is_current(event.link) {
            tracing::trace!(link = event.link, "Ignoring event from superseded link");
            return;
        }
        match event.kind {
            LinkEventKind::Opened => {
                let action = self.supervisor.on_open(event.link);
                self.apply(action);
            }
            LinkEventKind::Frame(text) => self.on_frame(&text),
            LinkEventKind::Closed(reason) => {
                tracing::warn!(
                    link = event.link,
                    reason = reason.as_deref().unwrap_or("closed"),
                    "Event stream disconnected"
                );
                self.link = None;
                let action = self.supervisor.on_closed(event.link);
                self.apply(action);
            }
        }
    }

    fn on_frame(&mut self, text: &str) {
        match stream::decode(text) {
            Ok(Inbound::Ping) => {
                if let Some(link) = &self.link {
                    link.send(PONG);
                }
            }
            Ok(Inbound::Data(envelope)) => {
                let signal = stream::dispatch(&mut store::lock(&self.stores), envelope);
                if let Some(signal) = signal {
                    let _ = self.signals.send(signal);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed stream frame");
            }
        }
    }

    fn publish_status(&self) {
        let status = self.supervisor.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
