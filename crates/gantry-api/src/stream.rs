//! Console log subscriptions.
//!
//! A [`LogStreamer`] keeps at most one live subscription. Every subscription
//! carries a generation and the highest generation opened so far is the
//! active one; a [`LogSubscription`] only delivers entries while its
//! generation is active and its [`LogCancel`] handle has not fired. Entries arriving after either check
//! fails are discarded, so a superseded subscription can never leak lines
//! into the caller.
//!
//! Subscriptions are not restartable. When the transport ends or errors the
//! error is surfaced once and the subscription is finished; resuming means
//! calling `open` again.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{LogStream, ManagementClient};
use crate::error::ApiError;
use crate::types::{LogEntry, LogSource};

/// Cooperative cancellation handle for one subscription.
#[derive(Debug, Clone, Default)]
pub struct LogCancel(CancellationToken);

impl LogCancel {
    /// Create an untriggered handle.
    #[must_use]
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    /// Signal the subscription to stop. Idempotent.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Opens log subscriptions and tracks which one is current.
#[derive(Debug)]
pub struct LogStreamer<C> {
    client: Arc<C>,
    active: Arc<AtomicU64>,
}

impl<C> Clone for LogStreamer<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            active: Arc::clone(&self.active),
        }
    }
}

impl<C: ManagementClient> LogStreamer<C> {
    /// Create a streamer over `client`.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            active: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Generation of the most recently opened subscription (0 before any).
    #[must_use]
    pub fn active_generation(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Open a subscription to `server`'s `source` channel.
    ///
    /// Any previously opened subscription stops delivering immediately.
    pub async fn open(&self, server: &str, source: LogSource) -> Result<LogSubscription, ApiError> {
        let generation = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.open_with(server, source, generation, LogCancel::new()).await
    }

    /// Like [`open`](Self::open), but under a generation and handle the
    /// caller allocated beforehand.
    ///
    /// Opens may complete in any order: a subscription is superseded only by
    /// one with a higher `generation`. Cancelling `cancel` while the open is
    /// in flight yields a subscription that delivers nothing.
    pub async fn open_with(
        &self,
        server: &str,
        source: LogSource,
        generation: u64,
        cancel: LogCancel,
    ) -> Result<LogSubscription, ApiError> {
        self.active.fetch_max(generation, Ordering::SeqCst);
        debug!(server = %server, source = %source, generation, "opening log subscription");
        let stream = self.client.subscribe_logs(server, source).await?;
        Ok(LogSubscription {
            server: server.to_string(),
            source,
            generation,
            active: Arc::clone(&self.active),
            cancel,
            stream,
            finished: false,
        })
    }
}

/// A live, append-only, non-restartable sequence of [`LogEntry`].
pub struct LogSubscription {
    server: String,
    source: LogSource,
    generation: u64,
    active: Arc<AtomicU64>,
    cancel: LogCancel,
    stream: LogStream,
    finished: bool,
}

impl fmt::Debug for LogSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSubscription")
            .field("server", &self.server)
            .field("source", &self.source)
            .field("generation", &self.generation)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl LogSubscription {
    /// Server this subscription follows.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Channel this subscription follows.
    #[must_use]
    pub const fn source(&self) -> LogSource {
        self.source
    }

    /// Generation tag assigned at open.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// A handle that cancels this subscription.
    #[must_use]
    pub fn cancel_handle(&self) -> LogCancel {
        self.cancel.clone()
    }

    /// Cancel this subscription.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn is_current(&self) -> bool {
        !self.cancel.is_cancelled() && self.active.load(Ordering::SeqCst) == self.generation
    }

    /// Wait for the next entry.
    ///
    /// Returns `None` once the subscription has ended, been cancelled or been
    /// superseded. A transport error is returned once, after which the
    /// subscription is finished.
    pub async fn next(&mut self) -> Option<Result<LogEntry, ApiError>> {
        if self.finished || !self.is_current() {
            self.finished = true;
            return None;
        }

        let token = self.cancel.0.clone();
        let item = tokio::select! {
            biased;
            () = token.cancelled() => None,
            item = self.stream.next() => item,
        };

        if !self.is_current() {
            if item.is_some() {
                debug!(generation = self.generation, "discarding entry from stale subscription");
            }
            self.finished = true;
            return None;
        }
        match item {
            Some(Ok(entry)) => Some(Ok(entry)),
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeClient;
    use std::time::Duration;

    fn entry(msg: &str) -> Result<LogEntry, ApiError> {
        Ok(LogEntry::new(msg, LogSource::Combined))
    }

    #[tokio::test]
    async fn delivers_in_order() {
        let fake = FakeClient::new().with_credential(Some("k"));
        let feed = fake.push_log_feed();
        let streamer = LogStreamer::new(Arc::new(fake));

        let mut sub = streamer.open("lobby", LogSource::Combined).await.expect("open");
        for msg in ["A", "B", "C"] {
            feed.unbounded_send(entry(msg)).expect("feed");
        }
        for expected in ["A", "B", "C"] {
            let got = sub.next().await.expect("entry").expect("ok");
            assert_eq!(got.message, expected);
        }
        assert_eq!(sub.generation(), 1);
    }

    #[tokio::test]
    async fn handle_cancelled_before_open_delivers_nothing() {
        let fake = FakeClient::new().with_credential(Some("k"));
        let feed = fake.push_log_feed();
        let streamer = LogStreamer::new(Arc::new(fake));
        let cancel = LogCancel::new();
        cancel.cancel();

        let mut sub = streamer
            .open_with("lobby", LogSource::Java, 1, cancel)
            .await
            .expect("open");
        feed.unbounded_send(entry("A")).expect("feed");
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn entries_after_cancel_are_discarded() {
        let fake = FakeClient::new().with_credential(Some("k"));
        let first_feed = fake.push_log_feed();
        let _second_feed = fake.push_log_feed();
        let streamer = LogStreamer::new(Arc::new(fake));

        let mut first = streamer.open("lobby", LogSource::Combined).await.expect("open gen 1");
        first_feed.unbounded_send(entry("A")).expect("feed");
        first_feed.unbounded_send(entry("B")).expect("feed");
        assert_eq!(first.next().await.expect("A").expect("ok").message, "A");
        assert_eq!(first.next().await.expect("B").expect("ok").message, "B");

        // Reselection: cancel the old handle, then open generation 2.
        first.cancel_handle().cancel();
        let second = streamer.open("arena", LogSource::Combined).await.expect("open gen 2");
        assert_eq!(second.generation(), 2);
        assert_eq!(streamer.active_generation(), 2);

        // C was produced for generation 1 and must never be delivered.
        first_feed.unbounded_send(entry("C")).expect("feed");
        assert!(first.next().await.is_none());
        assert!(first.next().await.is_none());
    }

    #[tokio::test]
    async fn superseded_subscription_stops_without_cancel() {
        let fake = FakeClient::new().with_credential(Some("k"));
        let first_feed = fake.push_log_feed();
        let _second_feed = fake.push_log_feed();
        let streamer = LogStreamer::new(Arc::new(fake));

        let mut first = streamer.open("lobby", LogSource::Server).await.expect("open");
        let _second = streamer.open("lobby", LogSource::Java).await.expect("open");
        first_feed.unbounded_send(entry("late")).expect("feed");
        assert!(first.next().await.is_none());
    }

    #[tokio::test]
    async fn out_of_order_opens_keep_the_newest_generation() {
        let fake = FakeClient::new().with_credential(Some("k"));
        let newer_feed = fake.push_log_feed();
        let _older_feed = fake.push_log_feed();
        let streamer = LogStreamer::new(Arc::new(fake));

        // Generation 5 finishes opening before generation 4 does.
        let mut newer = streamer
            .open_with("arena", LogSource::Server, 5, LogCancel::new())
            .await
            .expect("open 5");
        let mut older = streamer
            .open_with("lobby", LogSource::Server, 4, LogCancel::new())
            .await
            .expect("open 4");
        assert_eq!(streamer.active_generation(), 5);
        assert_eq!(newer.server(), "arena");

        newer_feed.unbounded_send(entry("live")).expect("feed");
        assert_eq!(newer.next().await.expect("entry").expect("ok").message, "live");
        assert!(older.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_unblocks_pending_read() {
        let fake = FakeClient::new().with_credential(Some("k"));
        let _feed = fake.push_log_feed();
        let streamer = LogStreamer::new(Arc::new(fake));

        let mut sub = streamer.open("lobby", LogSource::Combined).await.expect("open");
        let handle = sub.cancel_handle();
        let reader = tokio::spawn(async move { sub.next().await.is_none() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        let ended = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("read returns promptly")
            .expect("join");
        assert!(ended);
    }

    #[tokio::test]
    async fn transport_error_is_surfaced_once() {
        let fake = FakeClient::new().with_credential(Some("k"));
        let feed = fake.push_log_feed();
        let streamer = LogStreamer::new(Arc::new(fake));

        let mut sub = streamer.open("lobby", LogSource::Combined).await.expect("open");
        feed.unbounded_send(Err(ApiError::Transport("reset by peer".into()))).expect("feed");
        feed.unbounded_send(entry("never")).expect("feed");

        assert!(matches!(sub.next().await, Some(Err(ApiError::Transport(_)))));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn end_of_stream_finishes() {
        let fake = FakeClient::new().with_credential(Some("k"));
        let feed = fake.push_log_feed();
        let streamer = LogStreamer::new(Arc::new(fake));

        let mut sub = streamer.open("lobby", LogSource::Combined).await.expect("open");
        feed.unbounded_send(entry("last")).expect("feed");
        drop(feed);
        assert_eq!(sub.next().await.expect("entry").expect("ok").message, "last");
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn open_failure_propagates() {
        let fake = FakeClient::new();
        let streamer = LogStreamer::new(Arc::new(fake));
        let err = streamer.open("lobby", LogSource::Combined).await.err();
        assert!(matches!(err, Some(ApiError::CredentialMissing)));
    }
}
