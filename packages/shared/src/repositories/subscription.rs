use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::game_match::Snapshot;

/// Live feed of snapshots for one match.
///
/// The listener behind it is released when the subscription is dropped, so a
/// game view that goes out of scope stops receiving updates.
#[derive(Debug)]
pub struct MatchSubscription {
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    listener: Option<JoinHandle<()>>,
}

impl MatchSubscription {
    /// Subscription fed by a store that pushes into the paired sender.
    pub fn channel() -> (mpsc::UnboundedSender<Snapshot>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            sender,
            MatchSubscription {
                receiver,
                listener: None,
            },
        )
    }

    /// Subscription fed by a background task that is aborted on drop.
    pub fn with_listener(
        receiver: mpsc::UnboundedReceiver<Snapshot>,
        listener: JoinHandle<()>,
    ) -> Self {
        MatchSubscription {
            receiver,
            listener: Some(listener),
        }
    }

    /// Waits for the next snapshot. `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// Returns an already delivered snapshot without waiting.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for MatchSubscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
