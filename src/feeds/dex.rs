use super::{backoff_delay, FeedOrigin, RawFrame};
use crate::config::FeedsConfig;
use crate::dedup::{SeenSet, SeenTransactionStore};
use crate::rate_limit::{fetch_with_retry, FetchOptions};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

#[derive(serde::Deserialize)]
struct TicketResponse {
    ticket: String,
}

/// Shared flag the rest of the system polls to decide whether the backup
/// poller should run (true whenever the feed has been closed for more than
/// one polling interval).
pub struct DexFeedHandle {
    is_open: Arc<AtomicBool>,
}

impl DexFeedHandle {
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Relaxed)
    }

    /// A clone of the underlying flag, handed to the backup poller so it
    /// can skip polling while the socket is up without coupling it to the
    /// WS connection loop directly.
    pub fn is_open_flag(&self) -> Arc<AtomicBool> {
        self.is_open.clone()
    }
}

/// Runs the DEX feed client forever, reconnecting with exponential backoff.
/// `pool_ids` is re-read on every (re)connect so a stale pool list never
/// gets baked into a long-lived subscription set.
pub async fn run(
    config: FeedsConfig,
    client: reqwest::Client,
    pool_ids: impl Fn() -> Vec<String> + Send + Sync + 'static,
    raw_events: mpsc::Sender<RawFrame>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> DexFeedHandle {
    let is_open = Arc::new(AtomicBool::new(false));
    let handle = DexFeedHandle {
        is_open: is_open.clone(),
    };

    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            if *shutdown.borrow() {
                return;
            }
            match connect_once(&config, &client, &pool_ids, &raw_events, &is_open, &mut shutdown).await {
                Ok(()) => {
                    attempt = 0;
                }
                Err(e) => {
                    warn!(error = %e, attempt, "dex feed connection failed");
                }
            }
            is_open.store(false, Ordering::Relaxed);
            if *shutdown.borrow() {
                return;
            }
            let delay = backoff_delay(
                Duration::from_millis(config.ws_reconnect_base_ms),
                Duration::from_millis(config.ws_reconnect_max_ms),
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

/// Spawns the C6 backup poller: every `trades_poll_ms`, if the WS feed is
/// not open, fetches recent trades for the top-N pools by activity and
/// injects any signature not already in `seen` into the same ingestion
/// channel the WS feed uses. `seen` is only consulted here, never
/// inserted into — the real dedup insert happens once the frame reaches
/// the ingestion loop, so a trade observed by both feeds still alerts once.
pub fn spawn_backup_poller(
    config: FeedsConfig,
    client: reqwest::Client,
    is_open: Arc<AtomicBool>,
    top_pools: impl Fn(usize) -> Vec<String> + Send + Sync + 'static,
    seen: Arc<SeenTransactionStore>,
    raw_events: mpsc::Sender<RawFrame>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(config.trades_poll_ms));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if is_open.load(Ordering::Relaxed) {
                        continue;
                    }
                    poll_once(&config, &client, &top_pools, &seen.dex, &raw_events).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });
}

async fn poll_once(
    config: &FeedsConfig,
    client: &reqwest::Client,
    top_pools: &(impl Fn(usize) -> Vec<String> + Send + Sync),
    seen: &SeenSet,
    raw_events: &mpsc::Sender<RawFrame>,
) {
    for pool_id in top_pools(config.backup_poll_top_n_pools) {
        let url = format!("{}/trades/{}?limit=20", config.dex_api_base, pool_id);
        match fetch_with_retry::<Vec<Value>>(client, &url, &FetchOptions::default()).await {
            Ok(trades) => {
                for value in trades {
                    let sig = extract_sig(&value).unwrap_or_default();
                    if sig.is_empty() || seen.contains(&sig) {
                        continue;
                    }
                    let _ = raw_events.send(RawFrame { origin: FeedOrigin::Dex, sig, value }).await;
                }
            }
            Err(e) => warn!(pool = pool_id, error = %e, "backup trade poll failed for pool"),
        }
    }
}

async fn fetch_ticket(config: &FeedsConfig, client: &reqwest::Client) -> anyhow::Result<String> {
    let url = format!("{}/ws-ticket", config.dex_api_base);
    let resp: TicketResponse = client.get(&url).send().await?.json().await?;
    Ok(resp.ticket)
}

async fn connect_once(
    config: &FeedsConfig,
    client: &reqwest::Client,
    pool_ids: &(impl Fn() -> Vec<String> + Send + Sync),
    raw_events: &mpsc::Sender<RawFrame>,
    is_open: &Arc<AtomicBool>,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let ticket = fetch_ticket(config, client).await?;
    let url = format!("{}?ticket={}", config.dex_ws_base, ticket);
    let (ws_stream, _) = connect_async(&url).await?;
    let (mut sink, mut stream) = ws_stream.split();
    info!("dex feed connected");
    is_open.store(true, Ordering::Relaxed);

    for pool in pool_ids() {
        let subscribe = json!({"type": "subscribe", "pool": pool, "limit": 10});
        if sink.send(Message::Text(subscribe.to_string())).await.is_err() {
            debug!(pool, "subscribe send failed, socket not open; dropped silently");
        }
    }

    let mut keepalive = tokio::time::interval(Duration::from_millis(config.keepalive_interval_ms));
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
                                    .send(RawFrame { origin: FeedOrigin::Dex, sig, value })
                                    .await;
                            }
                            Err(e) => debug!(error = %e, "dex feed: non-JSON frame"),
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "dex feed stream error");
                        return Err(e.into());
                    }
                    _ => {}
                }
            }
            _ = keepalive.tick() => {
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

fn is_heartbeat(value: &Value) -> bool {
    matches!(
        value.get("type").and_then(Value::as_str),
        Some("ping") | Some("pong") | Some("heartbeat")
    )
}

fn extract_sig(value: &Value) -> Option<String> {
    value
        .get("sig")
        .or_else(|| value.get("signature"))
        .or_else(|| value.get("trade").and_then(|t| t.get("sig")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_frames_are_recognized() {
        assert!(is_heartbeat(&json!({"type": "ping"})));
        assert!(is_heartbeat(&json!({"type": "heartbeat"})));
        assert!(!is_heartbeat(&json!({"type": "swap"})));
    }

    #[test]
    fn sig_extraction_checks_nested_trade_field() {
        assert_eq!(extract_sig(&json!({"sig": "abc"})), Some("abc".to_string()));
        assert_eq!(
            extract_sig(&json!({"trade": {"sig": "def"}})),
            Some("def".to_string())
        );
        assert_eq!(extract_sig(&json!({})), None);
    }
}
