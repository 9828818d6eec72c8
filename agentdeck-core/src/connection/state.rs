//! Connection lifecycle state machine.
//!
//! Pure and synchronous: the async task in [`super`] feeds it commands, link
//! events and timer fires, and performs the [`Action`]s it returns. Links and
//! timers are tagged with generation numbers so anything belonging to a
//! superseded link or a cancelled timer is ignored.

use std::time::Duration;

use super::backoff::Backoff;

/// Connection state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting `retry_in` before reconnect attempt number `attempt`
    Reconnecting { attempt: u32, retry_in: Duration },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Reconnecting { attempt, retry_in } => write!(
                f,
                "reconnecting in {:.1}s (attempt {})",
                retry_in.as_secs_f64(),
                attempt
            ),
        }
    }
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open a new link tagged `link`
    Open { link: u64 },
    /// Tear down the current link
    Close,
    /// Fire `on_timer(token)` after `delay`
    Schedule { token: u64, delay: Duration },
    /// The current link finished its handshake
    Opened { reconnect: bool },
}

#[derive(Debug)]
pub struct Supervisor {
    backoff: Backoff,
    status: ConnectionStatus,
    attempts: u32,
    /// Generation of the newest link
    link: u64,
    /// Whether link `link` is opening or open
    link_live: bool,
    /// Auto-reconnect is enabled until an explicit disconnect
    wanted: bool,
    timer: Option<u64>,
    next_token: u64,
    opened_before: bool,
}

impl Supervisor {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            status: ConnectionStatus::Disconnected,
            attempts: 0,
            link: 0,
            link_live: false,
            wanted: false,
            timer: None,
            next_token: 0,
            opened_before: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether events tagged `link` belong to the current link.
    pub fn is_current(&self, link: u64) -> bool {
        self.link_live && link == self.link
    }

    fn open_link(&mut self) -> Action {
        self.timer = None;
        self.link += 1;
        self.link_live = true;
        self.status = ConnectionStatus::Connecting;
        Action::Open { link: self.link }
    }

    /// Open a link unless one is already open or opening.
    ///
    /// A pending reconnect timer is superseded by the immediate attempt.
    pub fn connect(&mut self) -> Option<Action> {
        self.wanted = true;
        if self.link_live {
            return None;
        }
        Some(self.open_link())
    }

    pub fn on_open(&mut self, link: u64) -> Option<Action> {
        if !self.is_current(link) || self.status == ConnectionStatus::Connected {
            return None;
        }
        self.attempts = 0;
        self.status = ConnectionStatus::Connected;
        let reconnect = self.opened_before;
        self.opened_before = true;
        Some(Action::Opened { reconnect })
    }

    /// The link closed or failed to open. Schedules a reconnect while
    /// auto-reconnect is enabled.
    pub fn on_closed(&mut self, link: u64) -> Option<Action> {
        if !self.is_current(link) {
            return None;
        }
        self.link_live = false;
        if !self.wanted {
            self.status = ConnectionStatus::Disconnected;
            return None;
        }

        let delay = self.backoff.delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.next_token += 1;
        self.timer = Some(self.next_token);
        self.status = ConnectionStatus::Reconnecting {
            attempt: self.attempts,
            retry_in: delay,
        };
        Some(Action::Schedule {
            token: self.next_token,
            delay,
        })
    }

    /// A scheduled reconnect fired. Inert unless `token` is the pending timer.
    pub fn on_timer(&mut self, token: u64) -> Option<Action> {
        if self.timer != Some(token) || !self.wanted || self.link_live {
            return None;
        }
        Some(self.open_link())
    }

    /// Close the link, cancel any pending reconnect and reset the backoff.
    pub fn disconnect(&mut self) -> Option<Action> {
        self.wanted = false;
        self.attempts = 0;
        self.timer = None;
        self.status = ConnectionStatus::Disconnected;
        if self.link_live {
            self.link_live = false;
            Some(Action::Close)
        } else {
            None
        }
    }
}
