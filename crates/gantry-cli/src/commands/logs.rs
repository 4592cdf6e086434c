//! Logs command implementation.
//!
//! Follows one server's console output until the stream ends, fails, or the
//! interrupt future resolves.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use gantry_api::{LogSource, LogStreamer, ManagementClient};
use tracing::debug;

use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the logs command.
pub struct LogsCommand<C> {
    streamer: LogStreamer<C>,
}

impl<C: ManagementClient + 'static> LogsCommand<C> {
    /// Creates a new logs command handler.
    #[must_use]
    pub fn new(client: Arc<C>) -> Self {
        Self {
            streamer: LogStreamer::new(client),
        }
    }

    /// Print entries as they arrive.
    ///
    /// When `interrupt` resolves the subscription is cancelled and the
    /// command returns successfully.
    pub async fn follow<W, F>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        server: &str,
        source: LogSource,
        interrupt: F,
    ) -> Result<(), CliError>
    where
        W: Write,
        F: Future<Output = ()> + Send + 'static,
    {
        let mut subscription = self.streamer.open(server, source).await?;
        let cancel = subscription.cancel_handle();
        let watcher = tokio::spawn(async move {
            interrupt.await;
            cancel.cancel();
        });

        let result = async {
            while let Some(entry) = subscription.next().await {
                format.write_line(writer, &entry?)?;
            }
            Ok::<(), CliError>(())
        }
        .await;

        if subscription.cancel_handle().is_cancelled() {
            debug!(server = %server, "log follow interrupted");
        }
        watcher.abort();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_api::fake::{Call, FakeClient};
    use gantry_api::{ApiError, LogEntry};

    fn entry(msg: &str) -> Result<LogEntry, ApiError> {
        Ok(LogEntry::new(msg, LogSource::Server))
    }

    #[tokio::test]
    async fn prints_until_stream_ends() {
        let api = FakeClient::new().with_credential(Some("key"));
        let feed = api.push_log_feed();
        feed.unbounded_send(entry("Starting")).expect("feed");
        feed.unbounded_send(entry("Done!")).expect("feed");
        drop(feed);

        let mut buf = Vec::new();
        LogsCommand::new(Arc::new(api.clone()))
            .follow(&mut buf, &OutputFormat::default(), "lobby", LogSource::Server, std::future::pending::<()>())
            .await
            .expect("follow");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "[server] Starting\n[server] Done!\n");
        assert_eq!(api.calls(), [Call::Subscribe("lobby".into(), LogSource::Server)]);
    }

    #[tokio::test]
    async fn interrupt_ends_follow_cleanly() {
        let api = FakeClient::new().with_credential(Some("key"));
        let _feed = api.push_log_feed();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).expect("send");

        let mut buf = Vec::new();
        LogsCommand::new(Arc::new(api))
            .follow(&mut buf, &OutputFormat::default(), "lobby", LogSource::Combined, async move {
                let _ = rx.await;
            })
            .await
            .expect("follow");
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn transport_error_fails_the_command() {
        let api = FakeClient::new().with_credential(Some("key"));
        let feed = api.push_log_feed();
        feed.unbounded_send(entry("one")).expect("feed");
        feed.unbounded_send(Err(ApiError::Transport("reset".into()))).expect("feed");

        let mut buf = Vec::new();
        let err = LogsCommand::new(Arc::new(api))
            .follow(&mut buf, &OutputFormat::default(), "lobby", LogSource::Server, std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Api(ApiError::Transport(_))));
        assert_eq!(String::from_utf8(buf).expect("utf8"), "[server] one\n");
    }
}
