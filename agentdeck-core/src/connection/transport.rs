//! Duplex links to the live event stream.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};

/// What happened on a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEventKind {
    /// Handshake completed
    Opened,
    /// One inbound text frame
    Frame(String),
    /// The link closed or never opened, with a reason when one is known
    Closed(Option<String>),
}

/// A link event tagged with the link generation it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub link: u64,
    pub kind: LinkEventKind,
}

impl LinkEvent {
    pub fn new(link: u64, kind: LinkEventKind) -> Self {
        Self { link, kind }
    }
}

/// Outbound side of an open link. Dropping it closes the link.
#[derive(Debug)]
pub struct LinkHandle {
    outbound: mpsc::UnboundedSender<String>,
}

impl LinkHandle {
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self { outbound }
    }

    /// Queue a text frame. Returns false if the link is already gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.outbound.send(text.into()).is_ok()
    }
}

/// Opens links. Every event of a link must be reported on `events`, ending
/// with exactly one [`LinkEventKind::Closed`].
pub trait Connector: Send + 'static {
    fn open(&self, link: u64, events: mpsc::UnboundedSender<LinkEvent>) -> LinkHandle;
}

/// WebSocket connector for the dashboard server.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn open(&self, link: u64, events: mpsc::UnboundedSender<LinkEvent>) -> LinkHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let url = self.url.clone();
        tokio::spawn(async move {
            let reason = match run_socket(&url, link, &events, outbound_rx).await {
                Ok(()) => None,
                Err(e) => Some(e.to_string()),
            };
            let _ = events.send(LinkEvent::new(link, LinkEventKind::Closed(reason)));
        });
        LinkHandle::new(outbound_tx)
    }
}

/// Drive one socket until it closes. `Ok` means the handle was dropped.
async fn run_socket(
    url: &str,
    link: u64,
    events: &mpsc::UnboundedSender<LinkEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    tracing::debug!(url = %url, link, "Opening stream socket");

    // The handle may be dropped mid-handshake; the socket must not open then
    let handshake = connect_async(url);
    tokio::pin!(handshake);
    let mut queued = Vec::new();
    let ws = loop {
        tokio::select! {
            result = &mut handshake => match result {
                Ok((ws, _)) => break ws,
                Err(e) => return Err(Error::Transport(format!("connect failed: {}", e))),
            },
            out = outbound.recv() => match out {
                Some(text) => queued.push(text),
                None => {
                    tracing::debug!(link, "Link dropped during handshake");
                    return Ok(());
                }
            },
        }
    };
    if events
        .send(LinkEvent::new(link, LinkEventKind::Opened))
        .is_err()
    {
        return Ok(());
    }

    let (mut write, mut read) = ws.split();
    for text in queued {
        write.send(Message::Text(text)).await.map_err(transport)?;
    }
    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if events.send(LinkEvent::new(link, LinkEventKind::Frame(text))).is_err() {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "no reason given".to_string());
                    return Err(Error::Transport(format!("closed by server: {}", reason)));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(transport(e)),
                None => return Err(Error::Transport("stream ended".to_string())),
            },
            out = outbound.recv() => match out {
                Some(text) => write.send(Message::Text(text)).await.map_err(transport)?,
                None => {
                    // Handle dropped: local close
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            },
        }
    }
}

fn transport(e: tokio_tungstenite::tungstenite::Error) -> Error {
    Error::Transport(e.to_string())
}
