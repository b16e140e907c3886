//! Network quiescence detection.
//!
//! A page counts as idle once the number of in-flight requests has stayed at
//! or below a threshold for a quiet window. Threshold 0 is full idleness
//! (used before printing a PDF); threshold 1 tolerates one long-lived
//! connection such as an analytics beacon (used after navigation).

use std::collections::HashSet;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::stream::{self, BoxStream, StreamExt};

/// How long the in-flight count must stay under the threshold.
pub const QUIET_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSignal {
    Started(String),
    Settled(String),
}

/// Set of request ids currently in flight.
#[derive(Debug, Default)]
pub struct InflightRequests {
    ids: HashSet<String>,
}

impl InflightRequests {
    /// Redirects reuse the request id, so a repeated start is a no-op.
    pub fn apply(&mut self, signal: NetworkSignal) {
        match signal {
            NetworkSignal::Started(id) => {
                self.ids.insert(id);
            }
            NetworkSignal::Settled(id) => {
                self.ids.remove(&id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Network activity subscription for one page. Subscribe before triggering
/// the load so no request is missed.
pub struct NetworkIdleWatcher {
    signals: BoxStream<'static, NetworkSignal>,
    inflight: InflightRequests,
}

impl NetworkIdleWatcher {
    pub async fn subscribe(page: &Page) -> Result<Self, CdpError> {
        let started = page
            .event_listener::<EventRequestWillBeSent>()
            .await?
            .map(|ev| NetworkSignal::Started(ev.request_id.inner().clone()));
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await?
            .map(|ev| NetworkSignal::Settled(ev.request_id.inner().clone()));
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await?
            .map(|ev| NetworkSignal::Settled(ev.request_id.inner().clone()));

        Ok(Self::from_signals(
            stream::select(started, stream::select(finished, failed)).boxed(),
        ))
    }

    pub fn from_signals(signals: BoxStream<'static, NetworkSignal>) -> Self {
        Self {
            signals,
            inflight: InflightRequests::default(),
        }
    }

    /// Resolves once at most `max_inflight` requests have been pending for a
    /// full `quiet` window. Has no deadline of its own.
    pub async fn wait_for_idle(&mut self, max_inflight: usize, quiet: Duration) {
        loop {
            if self.inflight.len() <= max_inflight {
                match tokio::time::timeout(quiet, self.signals.next()).await {
                    Err(_) => return,
                    Ok(Some(signal)) => self.inflight.apply(signal),
                    // page went away; nothing left to wait for
                    Ok(None) => return,
                }
            } else {
                match self.signals.next().await {
                    Some(signal) => self.inflight.apply(signal),
                    None => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn started(id: &str) -> NetworkSignal {
        NetworkSignal::Started(id.to_string())
    }

    fn settled(id: &str) -> NetworkSignal {
        NetworkSignal::Settled(id.to_string())
    }

    fn channel_watcher() -> (mpsc::UnboundedSender<NetworkSignal>, NetworkIdleWatcher) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let signals = stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed();
        (tx, NetworkIdleWatcher::from_signals(signals))
    }

    #[test]
    fn test_inflight_counts_distinct_requests() {
        let mut inflight = InflightRequests::default();
        inflight.apply(started("1"));
        inflight.apply(started("2"));
        inflight.apply(started("1")); // redirect
        assert_eq!(inflight.len(), 2);
        inflight.apply(settled("1"));
        assert_eq!(inflight.len(), 1);
        inflight.apply(settled("2"));
        assert_eq!(inflight.len(), 0);
    }

    #[test]
    fn test_settle_unknown_request_is_ignored() {
        let mut inflight = InflightRequests::default();
        inflight.apply(settled("ghost"));
        assert_eq!(inflight.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_after_quiet_window_with_no_traffic() {
        let (_tx, mut watcher) = channel_watcher();
        let start = tokio::time::Instant::now();
        watcher.wait_for_idle(0, QUIET_WINDOW).await;
        assert!(start.elapsed() >= QUIET_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_pending_request_to_settle() {
        let (tx, mut watcher) = channel_watcher();
        tx.send(started("font")).unwrap();

        let settle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            tx.send(settled("font")).unwrap();
            tx
        });

        let start = tokio::time::Instant::now();
        watcher.wait_for_idle(0, QUIET_WINDOW).await;
        assert!(start.elapsed() >= Duration::from_secs(3) + QUIET_WINDOW);
        drop(settle.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerates_one_long_lived_connection() {
        let (tx, mut watcher) = channel_watcher();
        tx.send(started("beacon")).unwrap();

        let start = tokio::time::Instant::now();
        watcher.wait_for_idle(1, QUIET_WINDOW).await;
        assert!(start.elapsed() < Duration::from_secs(1));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_ends_wait() {
        let (tx, mut watcher) = channel_watcher();
        tx.send(started("a")).unwrap();
        tx.send(started("b")).unwrap();
        drop(tx);
        watcher.wait_for_idle(0, QUIET_WINDOW).await;
    }
}
