// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket transport built on `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::transport::{Connector, Outbound, TransportChannels, TransportEvent};
use crate::error::ProtocolError;

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket links.
///
/// Each link runs a pump task that writes [`Outbound`] frames and
/// forwards text frames as [`TransportEvent`]s. Pings are answered by
/// tungstenite while the socket is read. The task ends when either side
/// closes.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    capacity: usize,
}

impl WebSocketConnector {
    /// Default channel capacity in each direction.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Creates a connector with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a connector with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<TransportChannels, ProtocolError> {
        let (stream, response) = connect_async(url).await?;
        tracing::debug!(status = ?response.status(), "WebSocket handshake complete");

        let (out_tx, out_rx) = mpsc::channel(self.capacity);
        let (in_tx, in_rx) = mpsc::channel(self.capacity);
        tokio::spawn(pump(stream, out_rx, in_tx));

        Ok(TransportChannels {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

async fn pump(
    stream: Stream,
    mut outgoing: mpsc::Receiver<Outbound>,
    incoming: mpsc::Sender<TransportEvent>,
) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                        fail(&incoming, &e).await;
                        return;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = write.send(WsMessage::Close(Some(frame))).await;
                    return;
                }
                None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return;
                }
            },

            message = read.next() => match message {
                Some(Ok(WsMessage::Text(text))) => {
                    if incoming.send(TransportEvent::Message(text.to_string())).await.is_err() {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                        .unwrap_or_default();
                    tracing::debug!(code = ?code, reason = %reason, "Received close frame");
                    let _ = incoming.send(TransportEvent::Closed { code, reason }).await;
                    return;
                }
                Some(Ok(WsMessage::Binary(_))) => {
                    tracing::warn!("Ignoring unexpected binary frame");
                }
                // tungstenite queues the pong reply itself
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(e)) => {
                    fail(&incoming, &e).await;
                    return;
                }
                None => {
                    let _ = incoming
                        .send(TransportEvent::Closed {
                            code: None,
                            reason: "stream ended".to_string(),
                        })
                        .await;
                    return;
                }
            },
        }
    }
}

async fn fail(incoming: &mpsc::Sender<TransportEvent>, error: &impl std::fmt::Display) {
    tracing::warn!(error = %error, "WebSocket error");
    let _ = incoming.send(TransportEvent::Error(error.to_string())).await;
    let _ = incoming
        .send(TransportEvent::Closed {
            code: None,
            reason: error.to_string(),
        })
        .await;
}
