//! JSON-RPC `logsSubscribe`-based wallet feed. One subscription per wallet
//! currently tracked by any subscriber; the subscription set is
//! re-synchronized on every reconnect and whenever `refresh()` is called.

use super::{backoff_delay, FeedOrigin, RawFrame};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

pub struct WalletFeedHandle {
    is_open: Arc<AtomicBool>,
    refresh_notify: Arc<Notify>,
}

impl WalletFeedHandle {
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Relaxed)
    }

    /// Wakes the connection loop so it re-reads the wallet set and, if the
    /// socket is already open, issues subscribe requests for any new
    /// wallets without waiting for a reconnect.
    pub fn refresh(&self) {
        self.refresh_notify.notify_one();
    }
}

pub async fn run(
    rpc_ws_url: String,
    reconnect_base_ms: u64,
    reconnect_max_ms: u64,
    wallets: impl Fn() -> HashSet<String> + Send + Sync + 'static,
    raw_events: mpsc::Sender<RawFrame>,
    mut shutdown: watch::Receiver<bool>,
) -> WalletFeedHandle {
    let is_open = Arc::new(AtomicBool::new(false));
    let refresh_notify = Arc::new(Notify::new());
    let handle = WalletFeedHandle {
        is_open: is_open.clone(),
        refresh_notify: refresh_notify.clone(),
    };

    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            if *shutdown.borrow() {
                return;
            }
            match connect_once(
                &rpc_ws_url,
                &wallets,
                &raw_events,
                &is_open,
                &refresh_notify,
                &mut shutdown,
            )
            .await
            {
                Ok(()) => attempt = 0,
                Err(e) => warn!(error = %e, attempt, "wallet feed connection failed"),
            }
            is_open.store(false, Ordering::Relaxed);
            if *shutdown.borrow() {
                return;
            }
            let delay = backoff_delay(
                Duration::from_millis(reconnect_base_ms),
                Duration::from_millis(reconnect_max_ms),
                attempt,
            );
            attempt += 1;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => { if *shutdown.borrow() { return; } }
            }
        }
    });

    handle
}

async fn connect_once(
    rpc_ws_url: &str,
    wallets: &(impl Fn() -> HashSet<String> + Send + Sync),
    raw_events: &mpsc::Sender<RawFrame>,
    is_open: &Arc<AtomicBool>,
    refresh_notify: &Arc<Notify>,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (ws_stream, _) = connect_async(rpc_ws_url).await?;
    let (mut sink, mut stream) = ws_stream.split();
    info!("wallet feed connected");
    is_open.store(true, Ordering::Relaxed);

    let mut current_subscriptions: HashSet<String> = HashSet::new();
    let mut next_id: u64 = 1;
    subscribe_missing(&mut sink, &wallets(), &mut current_subscriptions, &mut next_id).await?;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Value>(&text) {
                            Ok(value) => {
                                if is_heartbeat(&value) {
                                    continue;
                                }
                                let sig = extract_sig(&value).unwrap_or_default();
                                let _ = raw_events
                                    .send(RawFrame { origin: FeedOrigin::Wallet, sig, value })
                                    .await;
                            }
                            Err(e) => debug!(error = %e, "wallet feed: non-JSON frame"),
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => {
                        error!(error = %e, "wallet feed stream error");
                        return Err(e.into());
                    }
                    _ => {}
                }
            }
            _ = refresh_notify.notified() => {
                subscribe_missing(&mut sink, &wallets(), &mut current_subscriptions, &mut next_id).await?;
            }
            _ = tokio::time::sleep(Duration::from_secs(30)) => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    return Ok(());
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }
}

async fn subscribe_missing(
    sink: &mut WsSink,
    desired: &HashSet<String>,
    current: &mut HashSet<String>,
    next_id: &mut u64,
) -> anyhow::Result<()> {
    for wallet in desired.difference(&current.clone()) {
        let id = *next_id;
        *next_id += 1;
        let req = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "logsSubscribe",
            "params": [
                {"mentions": [wallet]},
                {"commitment": "confirmed"}
            ]
        });
        if sink.send(Message::Text(req.to_string())).await.is_ok() {
            current.insert(wallet.clone());
        } else {
            debug!(wallet, "logsSubscribe send failed, socket not open; dropped silently");
        }
    }
    current.retain(|w| desired.contains(w));
    Ok(())
}

fn is_heartbeat(value: &Value) -> bool {
    matches!(
        value.get("type").and_then(Value::as_str),
        Some("ping") | Some("pong") | Some("heartbeat")
    )
}

fn extract_sig(value: &Value) -> Option<String> {
    value
        .get("params")
        .and_then(|p| p.get("result"))
        .and_then(|r| r.get("value"))
        .and_then(|v| v.get("signature"))
        .or_else(|| value.get("signature"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_signature_from_logs_notification_shape() {
        let msg = json!({
            "params": {
                "result": {
                    "value": {"signature": "sig123", "err": null, "logs": []}
                }
            }
        });
        assert_eq!(extract_sig(&msg), Some("sig123".to_string()));
    }

    #[test]
    fn heartbeat_frames_are_recognized() {
        assert!(is_heartbeat(&json!({"type": "pong"})));
        assert!(!is_heartbeat(&json!({"params": {}})));
    }
}
