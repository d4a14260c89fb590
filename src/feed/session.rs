use super::activity_feed::{ActivityFeed, FeedContext, FeedEvent};
use crate::backend::Backend;
use crate::config::FeedConfig;
use crate::core::{FeedError, Result};
use crate::model::EnrichedActivity;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{Level, event};

/// A running feed.
///
/// One driver task owns the `ActivityFeed` and handles both streams strictly
/// one event at a time, so the list is never mutated concurrently. Every
/// change to the visible list is published on a `watch` channel.
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use checkin_feed::{FeedConfig, FeedSession, InMemoryBackend};
/// # tokio_test::block_on(async {
/// let backend = InMemoryBackend::with_tables(&["user_latest_checkins", "contacts"]).await;
/// backend.sign_in("owner".into()).await;
///
/// let session = FeedSession::start(Arc::new(backend), FeedConfig::default()).await?;
/// assert!(session.current().is_empty());
///
/// session.shutdown().await?;
/// # Ok::<(), checkin_feed::FeedError>(())
/// # }).unwrap();
/// ```
pub struct FeedSession {
    context: FeedContext,
    stop: Option<oneshot::Sender<()>>,
    views: watch::Receiver<Vec<EnrichedActivity>>,
    task: JoinHandle<()>,
}

impl FeedSession {
    pub async fn start<B>(backend: Arc<B>, config: FeedConfig) -> Result<Self>
    where
        B: Backend + ?Sized + 'static,
    {
        let feed = ActivityFeed::open(backend, config).await?;
        let context = feed.context();
        let (view_tx, views) = watch::channel(feed.entries().to_vec());
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(drive(feed, view_tx, stop_rx));

        Ok(Self {
            context,
            stop: Some(stop),
            views,
            task,
        })
    }

    /// Receiver that observes every published list
    pub fn views(&self) -> watch::Receiver<Vec<EnrichedActivity>> {
        self.views.clone()
    }

    /// Latest published list
    pub fn current(&self) -> Vec<EnrichedActivity> {
        self.views.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.context.is_active()
    }

    /// Stop the driver and close both subscriptions
    pub async fn shutdown(mut self) -> Result<()> {
        self.context.deactivate();
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| FeedError::Internal(format!("feed driver failed: {e}")))
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        // Dropping the sender also stops the driver; the flag covers fetches
        // that resolve before it notices.
        self.context.deactivate();
    }
}

async fn drive<B>(
    mut feed: ActivityFeed<B>,
    views: watch::Sender<Vec<EnrichedActivity>>,
    mut stop: oneshot::Receiver<()>,
) where
    B: Backend + ?Sized,
{
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            next = feed.next_event() => {
                if next == FeedEvent::Idle {
                    let _ = (&mut stop).await;
                    break;
                }
                if feed.handle_event(next).await && feed.context().is_active() {
                    views.send_replace(feed.entries().to_vec());
                }
            }
        }
    }

    feed.close().await;
    event!(Level::DEBUG, "feed driver stopped");
}
