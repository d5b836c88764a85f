//! Deferred change delivery.
//!
//! Records created inside a transaction are queued and only announced when the
//! outermost transaction ends. Observers receive notifications over channels,
//! so delivery never calls back into the store while it is being mutated.

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};

use log::warn;

use crate::error::{Error, Result};
use crate::ids::RecordId;
use crate::query::QueryId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct SubscriptionId(u64);

/// What a subscription listens to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topic {
    Item(RecordId),
    Items(Vec<RecordId>),
    Query(QueryId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Every record of one transaction that touched the observed item(s).
    Items {
        subscription: SubscriptionId,
        changes: Vec<RecordId>,
    },
    /// A live query's result set changed.
    Query {
        subscription: SubscriptionId,
        query: QueryId,
        results: Vec<RecordId>,
    },
}

/// Receiving half of a registration. Dropping it unregisters lazily.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<Notification>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn try_next(&self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }

    /// All notifications delivered so far.
    pub fn drain(&self) -> Vec<Notification> {
        self.receiver.try_iter().collect()
    }

    pub fn receiver(&self) -> &Receiver<Notification> {
        &self.receiver
    }
}

struct Registration {
    id: SubscriptionId,
    topic: Topic,
    sender: Sender<Notification>,
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl ObserverRegistry {
    pub(crate) fn subscribe(&mut self, topic: Topic) -> Subscription {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let (sender, receiver) = mpsc::channel();
        self.registrations.push(Registration { id, topic, sender });
        Subscription { id, receiver }
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        before != self.registrations.len()
    }

    /// Drop every registration on a retired query.
    pub(crate) fn forget_query(&mut self, query: QueryId) {
        self.registrations
            .retain(|r| r.topic != Topic::Query(query));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.registrations.len()
    }

    /// `changes` pairs each committed record with the items it touched, in
    /// creation order. Returns how many notifications were sent.
    pub(crate) fn deliver_item_changes(&mut self, changes: &[(RecordId, Vec<RecordId>)]) -> usize {
        let mut sent = 0;
        let mut dead = Vec::new();
        for registration in &self.registrations {
            let observed: HashSet<RecordId> = match &registration.topic {
                Topic::Item(item) => HashSet::from([*item]),
                Topic::Items(items) => items.iter().copied().collect(),
                Topic::Query(_) => continue,
            };
            let relevant: Vec<RecordId> = changes
                .iter()
                .filter(|(_, touched)| touched.iter().any(|item| observed.contains(item)))
                .map(|(record, _)| *record)
                .collect();
            if relevant.is_empty() {
                continue;
            }
            let notification = Notification::Items {
                subscription: registration.id,
                changes: relevant,
            };
            if registration.sender.send(notification).is_ok() {
                sent += 1;
            } else {
                dead.push(registration.id);
            }
        }
        self.prune(&dead);
        sent
    }

    pub(crate) fn deliver_query(&mut self, query: QueryId, results: &[RecordId]) -> usize {
        let mut sent = 0;
        let mut dead = Vec::new();
        for registration in &self.registrations {
            if registration.topic != Topic::Query(query) {
                continue;
            }
            let notification = Notification::Query {
                subscription: registration.id,
                query,
                results: results.to_vec(),
            };
            if registration.sender.send(notification).is_ok() {
                sent += 1;
            } else {
                dead.push(registration.id);
            }
        }
        self.prune(&dead);
        sent
    }

    fn prune(&mut self, dead: &[SubscriptionId]) {
        if dead.is_empty() {
            return;
        }
        for id in dead {
            warn!("event=subscription_dropped module=observer status=pruned subscription={}", id.0);
        }
        self.registrations.retain(|r| !dead.contains(&r.id));
    }
}

/// Records created since the outermost open transaction began.
#[derive(Debug, Default)]
pub(crate) struct ChangeQueue {
    depth: usize,
    pending: Vec<RecordId>,
}

impl ChangeQueue {
    pub(crate) fn begin(&mut self) {
        self.depth += 1;
    }

    /// Closes one level; yields the queued records when the outermost level
    /// closes.
    pub(crate) fn end(&mut self) -> Result<Option<Vec<RecordId>>> {
        if self.depth == 0 {
            return Err(Error::InvalidOperation(
                "end_transaction without matching begin_transaction".into(),
            ));
        }
        self.depth -= 1;
        if self.depth > 0 {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut self.pending)))
    }

    pub(crate) fn push(&mut self, record: RecordId) {
        self.pending.push(record);
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}
