//! Effect runtime.
//!
//! Each [`Effect`] becomes one short-lived task that performs a single
//! network operation and posts exactly one [`Message`] back to the loop.
//! Tasks never see the model.

use std::sync::Arc;

use gantry_api::{LogStreamer, ManagementClient};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::app::{Effect, Message};

/// Runs effects against `C`.
pub struct Runtime<C> {
    client: Arc<C>,
    streamer: LogStreamer<C>,
    tx: UnboundedSender<Message>,
}

impl<C: ManagementClient + 'static> Runtime<C> {
    /// Post results to `tx`.
    pub fn new(client: Arc<C>, tx: UnboundedSender<Message>) -> Self {
        Self {
            streamer: LogStreamer::new(Arc::clone(&client)),
            client,
            tx,
        }
    }

    /// Start every effect in order.
    pub fn run_all(&self, effects: impl IntoIterator<Item = Effect>) {
        for effect in effects {
            self.spawn(effect);
        }
    }

    /// Start `effect` on a background task.
    pub fn spawn(&self, effect: Effect) {
        let client = Arc::clone(&self.client);
        let streamer = self.streamer.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let msg = perform(&*client, &streamer, effect).await;
            // The loop has exited; nobody is left to tell.
            if tx.send(msg).is_err() {
                debug!("dashboard closed before effect completed");
            }
        });
    }
}

async fn perform<C: ManagementClient>(client: &C, streamer: &LogStreamer<C>, effect: Effect) -> Message {
    match effect {
        Effect::FetchServers => Message::ServersLoaded(client.list_servers().await),
        Effect::Action { server, action } => {
            let result = client.server_action(&server, action).await;
            Message::ActionFinished { server, action, result }
        }
        Effect::StopAll { timeout_secs } => Message::StopAllFinished(client.stop_all(timeout_secs).await),
        Effect::SendCommand { server, command } => {
            let result = client.send_command(&server, &command).await;
            Message::CommandSent { server, command, result }
        }
        Effect::OpenLogs {
            server,
            source,
            generation,
            cancel,
        } => Message::LogOpened {
            generation,
            result: streamer.open_with(&server, source, generation, cancel).await,
        },
        Effect::ReadLog {
            generation,
            mut subscription,
        } => {
            let entry = subscription.next().await;
            Message::LogReceived {
                generation,
                entry,
                subscription,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHandler;
    use gantry_api::fake::{Call, FakeClient};
    use gantry_api::{LogCancel, LogEntry, LogSource, Server, ServerAction};

    fn runtime(fake: &FakeClient) -> (Runtime<FakeClient>, EventHandler) {
        let events = EventHandler::detached();
        (Runtime::new(Arc::new(fake.clone()), events.sender()), events)
    }

    #[tokio::test]
    async fn fetch_posts_one_message() {
        let fake = FakeClient::new()
            .with_servers(vec![Server::new("lobby", "running")])
            .with_credential(Some("key"));
        let (runtime, mut events) = runtime(&fake);
        runtime.spawn(Effect::FetchServers);

        match events.next().await {
            Some(Message::ServersLoaded(Ok(servers))) => assert_eq!(servers.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fake.calls(), [Call::ListServers]);
    }

    #[tokio::test]
    async fn action_result_names_the_server() {
        let fake = FakeClient::new()
            .with_servers(vec![Server::new("lobby", "stopped")])
            .with_credential(Some("key"));
        let (runtime, mut events) = runtime(&fake);
        runtime.spawn(Effect::Action {
            server: "lobby".into(),
            action: ServerAction::Start,
        });

        match events.next().await {
            Some(Message::ActionFinished { server, result, .. }) => {
                assert_eq!(server, "lobby");
                assert!(result.is_ok());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(fake.servers()[0].is_running());
    }

    #[tokio::test]
    async fn logs_open_then_read_one_entry_per_effect() {
        let fake = FakeClient::new().with_credential(Some("key"));
        let feed = fake.push_log_feed();
        let (runtime, mut events) = runtime(&fake);
        runtime.spawn(Effect::OpenLogs {
            server: "lobby".into(),
            source: LogSource::Server,
            generation: 7,
            cancel: LogCancel::new(),
        });

        let subscription = match events.next().await {
            Some(Message::LogOpened { generation: 7, result }) => result.expect("opened"),
            other => panic!("unexpected {other:?}"),
        };
        feed.unbounded_send(Ok(LogEntry::new("A", LogSource::Server))).expect("feed");
        feed.unbounded_send(Ok(LogEntry::new("B", LogSource::Server))).expect("feed");

        runtime.spawn(Effect::ReadLog {
            generation: 7,
            subscription,
        });
        match events.next().await {
            Some(Message::LogReceived {
                generation: 7,
                entry: Some(Ok(entry)),
                ..
            }) => assert_eq!(entry.message, "A"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
