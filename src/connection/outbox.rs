//! Shared send path to whichever link is currently live

use crate::transport::OutboundFrame;
use reverse_link_shared::log::{truncate, FRAME_LOG_LIMIT};
use reverse_link_shared::{encode_reply, CodecError, Reply};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Cloneable handle for sending frames to the host.
///
/// Sends made while no link is attached, or after the link has closed, are
/// dropped silently.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<OutboundFrame>>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, sender: mpsc::UnboundedSender<OutboundFrame>) {
        *self.lock() = Some(sender);
    }

    pub(crate) fn detach(&self) {
        self.lock().take();
    }

    /// Whether a link is currently attached
    pub fn is_attached(&self) -> bool {
        self.lock().is_some()
    }

    /// Send a raw text frame. Returns whether it was handed to a live link.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        let sender = self.lock().clone();
        match sender {
            Some(sender) => {
                let sent = sender.send(OutboundFrame::Text(text.into())).is_ok();
                if !sent {
                    debug!("Link already closed, dropping outbound frame");
                }
                sent
            }
            None => {
                debug!("No live link, dropping outbound frame");
                false
            }
        }
    }

    /// Encode a reply and send it
    pub fn send_reply(&self, reply: &Reply) -> Result<(), CodecError> {
        let text = encode_reply(reply)?;
        debug!("Sending response: {}", truncate(&text, FRAME_LOG_LIMIT));
        self.send_text(text);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<OutboundFrame>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverse_link_shared::RequestId;
    use serde_json::json;

    #[test]
    fn test_send_without_link_is_silent() {
        let outbox = Outbox::new();
        assert!(!outbox.is_attached());
        assert!(!outbox.send_text("hello"));
        assert!(outbox.send_reply(&Reply::failure(None, "x")).is_ok());
    }

    #[test]
    fn test_send_after_close_is_silent() {
        let outbox = Outbox::new();
        let (tx, rx) = mpsc::unbounded_channel();
        outbox.attach(tx);
        drop(rx);

        assert!(outbox.is_attached());
        assert!(!outbox.send_text("hello"));
    }

    #[test]
    fn test_reply_reaches_link() {
        let outbox = Outbox::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        outbox.attach(tx);

        outbox
            .send_reply(&Reply::success(Some(RequestId::from(3)), json!("ok")))
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundFrame::Text(r#"{"id":3,"result":"ok"}"#.into())
        );

        outbox.detach();
        assert!(!outbox.send_text("late"));
        assert!(rx.try_recv().is_err());
    }
}
