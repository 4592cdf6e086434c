//! Terminal event pump.

use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;
use tracing::warn;

use crate::app::Message;

/// Event handler that polls for terminal events.
///
/// Terminal input, ticks and background task results all arrive on one
/// channel, so the loop handles them strictly one at a time.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Message>,
    tx: mpsc::UnboundedSender<Message>,
}

impl EventHandler {
    /// Start polling the terminal, emitting a tick every `tick_rate` without input.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        // crossterm's poll/read block, so they get their own thread. It exits
        // on the first failed send once the handler is dropped.
        thread::spawn(move || {
            loop {
                let msg = match event::poll(tick_rate) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Message::Key(key),
                        Ok(Event::Resize(_, _)) => Message::Resize,
                        Ok(_) => continue,
                        Err(e) => {
                            warn!(error = %e, "terminal read failed");
                            continue;
                        }
                    },
                    Ok(false) => Message::Tick,
                    Err(e) => {
                        warn!(error = %e, "terminal poll failed");
                        Message::Tick
                    }
                };
                if event_tx.send(msg).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// A handler fed only through [`sender`](Self::sender).
    pub fn detached() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Next message, in arrival order.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Sender for background task results.
    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_arrive_in_send_order() {
        let mut events = EventHandler::detached();
        let tx = events.sender();
        tx.send(Message::Notice("first".into())).expect("send");
        tx.send(Message::Tick).expect("send");

        assert!(matches!(events.next().await, Some(Message::Notice(msg)) if msg == "first"));
        assert!(matches!(events.next().await, Some(Message::Tick)));
    }
}
