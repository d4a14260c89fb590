use super::change::{ChangePayload, EventFilter, EventKind};
use crate::backend::query::RowFilter;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

/// What a subscriber wants to hear about
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSpec {
    pub channel: String,
    pub table: String,
    pub events: EventFilter,
    pub filter: Option<RowFilter>,
}

impl SubscriptionSpec {
    pub fn new(channel: &str, table: &str) -> Self {
        Self {
            channel: channel.to_string(),
            table: table.to_string(),
            events: EventFilter::All,
            filter: None,
        }
    }

    pub fn events(mut self, events: EventFilter) -> Self {
        self.events = events;
        self
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether a payload should be delivered to this subscriber.
    ///
    /// The row filter is checked against the new image for inserts, the old
    /// image for deletes, and either image for updates.
    pub fn accepts(&self, payload: &ChangePayload) -> bool {
        if payload.table != self.table || !self.events.accepts(payload.event_type) {
            return false;
        }
        let Some(filter) = &self.filter else {
            return true;
        };
        let on_new = payload.new_row().is_some_and(|r| filter.matches(r));
        let on_old = payload.old_row().is_some_and(|r| filter.matches(r));
        match payload.event_type {
            EventKind::Insert => on_new,
            EventKind::Delete => on_old,
            EventKind::Update => on_new || on_old,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owned handle to a live change subscription
///
/// Returned by `ChangeFeed::subscribe` and handed back by value to
/// `ChangeFeed::unsubscribe`. Dropping the handle closes the receiving side;
/// the backend prunes the dead sender on its next publish.
pub struct Subscription {
    id: SubscriptionId,
    spec: SubscriptionSpec,
    receiver: mpsc::UnboundedReceiver<ChangePayload>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        spec: SubscriptionSpec,
        receiver: mpsc::UnboundedReceiver<ChangePayload>,
    ) -> Self {
        Self { id, spec, receiver }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn spec(&self) -> &SubscriptionSpec {
        &self.spec
    }

    /// Next payload, or `None` once the backend closed the channel
    pub async fn recv(&mut self) -> Option<ChangePayload> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChangePayload> {
        self.receiver.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.spec.channel)
            .field("table", &self.spec.table)
            .finish()
    }
}

impl Stream for Subscription {
    type Item = ChangePayload;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn row(value: serde_json::Value) -> crate::core::Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_spec_accepts_by_table_event_and_filter() {
        let spec = SubscriptionSpec::new("feed", "activity")
            .filter(RowFilter::in_list("user_id", ["A", "B"]));

        assert!(spec.accepts(&ChangePayload::insert("activity", row(json!({ "user_id": "A" })))));
        assert!(!spec.accepts(&ChangePayload::insert("activity", row(json!({ "user_id": "C" })))));
        assert!(!spec.accepts(&ChangePayload::insert("other", row(json!({ "user_id": "A" })))));
        assert!(spec.accepts(&ChangePayload::delete("activity", row(json!({ "user_id": "B" })))));
        assert!(spec.accepts(&ChangePayload::update(
            "activity",
            row(json!({ "user_id": "C" })),
            Some(row(json!({ "user_id": "A" })))
        )));

        let inserts_only = SubscriptionSpec::new("feed", "activity")
            .events(EventFilter::Only(EventKind::Insert));
        assert!(!inserts_only.accepts(&ChangePayload::delete("activity", row(json!({ "user_id": "A" })))));
    }

    #[tokio::test]
    async fn test_subscription_is_a_stream() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(
            SubscriptionId::generate(),
            SubscriptionSpec::new("feed", "activity"),
            rx,
        );

        tx.send(ChangePayload::insert("activity", row(json!({ "user_id": "A" }))))
            .unwrap();
        drop(tx);

        let first = sub.next().await.unwrap();
        assert_eq!(first.event_type, EventKind::Insert);
        assert!(sub.next().await.is_none());
    }
}
