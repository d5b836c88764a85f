use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::axioms;
use crate::error::{Error, Result};
use crate::filter::{ActiveFilter, History, OrdinalFact, Resolution, RetrievalFilter, VoteFact};
use crate::ids::{IdGenerator, IdKind, PseudoNode, RecordId, Timestamp};
use crate::observer::{ChangeQueue, ObserverRegistry, Subscription, SubscriptionId, Topic};
use crate::order_key;
use crate::query::{QueryId, QueryRunner, QuerySpec, QueryState};
use crate::record::{
    Account, Entry, EntryData, EntryRef, EntryView, Item, Ordinal, Record, RecordKind,
    Transaction, Vote,
};
use crate::traits::{Clock, SystemClock};
use crate::value::Value;

/// Construction-time settings for a [`World`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorldConfig {
    pub retrieval_filter: RetrievalFilter,
    /// Seeds pseudo-nodes, clock sequences and ordinal suffixes; OS entropy
    /// when absent.
    pub seed: Option<u64>,
}

/// The record store.
///
/// Owns the identity index, the session and transaction context, the live
/// query runners and every observer registration. All mutation goes through
/// methods on this handle.
pub struct World<C: Clock = SystemClock> {
    ids: IdGenerator<C>,
    records: HashMap<RecordId, Record>,
    items: Vec<RecordId>,
    users: HashMap<PseudoNode, RecordId>,
    transactions: Vec<Transaction>,
    changes: ChangeQueue,
    current_user: Option<RecordId>,
    filter: ActiveFilter,
    observers: ObserverRegistry,
    queries: BTreeMap<QueryId, QueryRunner>,
    next_query: u64,
}

impl World<SystemClock> {
    /// A store on the system clock with default settings.
    pub fn in_memory() -> Self {
        Self::bootstrap(None, ActiveFilter::LastEditWins, SystemClock)
    }
}

impl<C: Clock> World<C> {
    pub fn new(config: WorldConfig, clock: C) -> Result<Self> {
        let filter = ActiveFilter::try_from(config.retrieval_filter)?;
        Ok(Self::bootstrap(config.seed, filter, clock))
    }

    fn bootstrap(seed: Option<u64>, filter: ActiveFilter, clock: C) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut world = Self {
            ids: IdGenerator::new(clock, rng),
            records: HashMap::new(),
            items: Vec::new(),
            users: HashMap::new(),
            transactions: Vec::new(),
            changes: ChangeQueue::default(),
            current_user: None,
            filter,
            observers: ObserverRegistry::default(),
            queries: BTreeMap::new(),
            next_query: 0,
        };
        for axiom in axioms::ALL {
            world.attach(Record::Item(Item::new(axiom.id())));
        }
        world
            .users
            .insert(axioms::AXIOMATIC_USER.id().pseudo_node(), axioms::AXIOMATIC_USER.id());
        world
    }

    /// Allocate an identifier carrying the logged-in user's pseudo-node.
    pub fn new_identifier(&mut self, kind: IdKind) -> RecordId {
        let node = self.current_user.map(|user| user.pseudo_node());
        self.ids.next_id(kind, node)
    }

    pub fn clock(&self) -> &C {
        self.ids.clock()
    }
}

// Sessions.
impl<C: Clock> World<C> {
    /// Create a login identity and log it in.
    pub fn new_user(&mut self, name: &str, password: Option<&str>) -> Result<RecordId> {
        if let Some(user) = self.current_user {
            return Err(Error::AlreadyLoggedIn(user));
        }
        let node = self.ids.random_node();
        let id = self.ids.next_id(IdKind::TimeBased, Some(node));
        let mut item = Item::new(id);
        item.account = Some(Account {
            password: password.map(str::to_string),
        });

        self.in_transaction(|world| {
            world.record_change(Record::Item(item));
            world.current_user = Some(id);
            world.add_entry(id, axioms::NAME.id(), Value::text(name))?;
            world.add_entry(id, axioms::CATEGORY.id(), Value::Item(axioms::PERSON.id()))?;
            Ok(())
        })?;
        info!("event=user_create module=world status=ok user={id}");
        Ok(id)
    }

    pub fn login(&mut self, user: RecordId, password: Option<&str>) -> Result<()> {
        if let Some(current) = self.current_user {
            return Err(Error::AlreadyLoggedIn(current));
        }
        let account = self
            .get_item_from_uuid(user)
            .and_then(Item::account)
            .ok_or_else(|| Error::AccessDenied(format!("{user} is not a login identity")))?;
        if !account.accepts(password) {
            warn!("event=user_login module=world status=denied user={user}");
            return Err(Error::AccessDenied(format!("wrong password for {user}")));
        }
        self.current_user = Some(user);
        info!("event=user_login module=world status=ok user={user}");
        Ok(())
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.current_user.take() {
            info!("event=user_logout module=world status=ok user={user}");
        }
    }

    pub fn current_user(&self) -> Option<RecordId> {
        self.current_user
    }

    /// Every login identity known to the store, in creation order.
    pub fn users(&self) -> Vec<RecordId> {
        self.items()
            .filter(|item| item.is_user())
            .map(Item::id)
            .collect()
    }

    fn require_user(&self) -> Result<RecordId> {
        self.current_user.ok_or_else(|| {
            warn!("event=write_rejected module=world status=error reason=not_logged_in");
            Error::NotLoggedIn
        })
    }
}

// Transactions and change delivery.
impl<C: Clock> World<C> {
    pub fn begin_transaction(&mut self) {
        self.changes.begin();
    }

    /// Closes one transaction level. Closing the outermost level commits the
    /// queued records and delivers one notification per affected observer.
    pub fn end_transaction(&mut self) -> Result<()> {
        if let Some(records) = self.changes.end()? {
            self.commit(records);
        }
        Ok(())
    }

    pub fn transaction_depth(&self) -> usize {
        self.changes.depth()
    }

    /// Committed transactions in completion order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    fn in_transaction<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.begin_transaction();
        let outcome = body(self);
        let closed = self.end_transaction();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    fn commit(&mut self, records: Vec<RecordId>) {
        let mut delivered = 0;
        if !records.is_empty() {
            let changes: Vec<(RecordId, Vec<RecordId>)> = records
                .iter()
                .map(|record| (*record, self.touched_items(*record)))
                .collect();
            self.transactions.push(Transaction { records });
            delivered += self.observers.deliver_item_changes(&changes);
            debug!(
                "event=transaction_commit module=world status=ok records={} index={}",
                changes.len(),
                self.transactions.len() - 1
            );
        }
        delivered += self.refresh_queries();
        if delivered > 0 {
            debug!("event=notify module=world status=ok notifications={delivered}");
        }
    }

    fn refresh_queries(&mut self) -> usize {
        let mut queries = std::mem::take(&mut self.queries);
        let mut sent = 0;
        for (id, runner) in queries.iter_mut() {
            if runner.refresh(self) {
                debug!(
                    "event=query_refresh module=world status=changed query={id} results={}",
                    runner.results().len()
                );
                sent += self.observers.deliver_query(*id, runner.results());
            }
        }
        self.queries = queries;
        sent
    }

    /// Items whose observers care about `record`.
    fn touched_items(&self, record: RecordId) -> Vec<RecordId> {
        match self.records.get(&record) {
            Some(Record::Item(item)) => vec![item.id],
            Some(Record::Entry(entry)) => entry.items(),
            Some(Record::Vote(Vote { target, .. })) | Some(Record::Ordinal(Ordinal { target, .. })) => {
                match self.records.get(target) {
                    Some(Record::Item(item)) => vec![item.id],
                    Some(Record::Entry(entry)) => entry.items(),
                    _ => Vec::new(),
                }
            }
            None => Vec::new(),
        }
    }
}

// Writes.
impl<C: Clock> World<C> {
    pub fn new_item(&mut self, name: Option<&str>) -> Result<RecordId> {
        self.require_user()?;
        self.in_transaction(|world| {
            let id = world.new_identifier(IdKind::TimeBased);
            world.record_change(Record::Item(Item::new(id)));
            if let Some(name) = name {
                world.add_entry(id, axioms::NAME.id(), Value::text(name))?;
            }
            Ok(id)
        })
    }

    /// An item usable as an attribute: named and filed under `Attribute`.
    pub fn new_attribute(&mut self, name: &str) -> Result<RecordId> {
        self.require_user()?;
        self.in_transaction(|world| {
            let id = world.new_item(Some(name))?;
            world.add_entry(id, axioms::CATEGORY.id(), Value::Item(axioms::ATTRIBUTE.id()))?;
            Ok(id)
        })
    }

    pub fn add_entry(&mut self, item: RecordId, attribute: RecordId, value: Value) -> Result<RecordId> {
        self.create_entry(
            EntryData::Literal {
                item,
                attribute,
                value,
            },
            None,
        )
    }

    /// Supersede `previous` with a new value for the same item and attribute.
    pub fn replace_entry(&mut self, previous: RecordId, value: Value) -> Result<RecordId> {
        let (item, attribute) = match self.entry(previous).map(Entry::data) {
            Some(EntryData::Literal {
                item, attribute, ..
            }) => (*item, *attribute),
            Some(EntryData::Connection { .. }) => {
                return Err(Error::InvalidOperation(format!(
                    "{previous} is a connection; replace it through create_entry"
                )))
            }
            None => return Err(self.missing(previous, RecordKind::Entry)),
        };
        self.create_entry(
            EntryData::Literal {
                item,
                attribute,
                value,
            },
            Some(previous),
        )
    }

    /// Link `(item_a, attribute_a)` and `(item_b, attribute_b)` with one
    /// shared entry visible from both items.
    pub fn add_connection(
        &mut self,
        item_a: RecordId,
        attribute_a: RecordId,
        item_b: RecordId,
        attribute_b: RecordId,
    ) -> Result<RecordId> {
        self.create_entry(
            EntryData::Connection {
                items: [item_a, item_b],
                attributes: [attribute_a, attribute_b],
            },
            None,
        )
    }

    /// Append a new entry, optionally replacing `previous`.
    pub fn create_entry(&mut self, data: EntryData, previous: Option<RecordId>) -> Result<RecordId> {
        self.require_user()?;
        match &data {
            EntryData::Literal {
                item,
                attribute,
                value,
            } => {
                self.expect_kind(*item, RecordKind::Item)?;
                self.expect_kind(*attribute, RecordKind::Item)?;
                if let Value::Item(target) = value {
                    self.expect_kind(*target, RecordKind::Item)?;
                }
            }
            EntryData::Connection { items, attributes } => {
                for id in items.iter().chain(attributes) {
                    self.expect_kind(*id, RecordKind::Item)?;
                }
            }
        }
        if let Some(previous) = previous {
            self.expect_kind(previous, RecordKind::Entry)?;
        }
        self.in_transaction(|world| {
            let id = world.new_identifier(IdKind::TimeBased);
            Ok(world.record_change(Record::Entry(Entry::new(id, previous, data))))
        })
    }

    pub fn vote_to_delete(&mut self, record: RecordId) -> Result<RecordId> {
        self.vote(record, false)
    }

    pub fn vote_to_retain(&mut self, record: RecordId) -> Result<RecordId> {
        self.vote(record, true)
    }

    fn vote(&mut self, target: RecordId, retain: bool) -> Result<RecordId> {
        self.require_user()?;
        self.expect_content(target)?;
        self.in_transaction(|world| {
            let id = world.new_identifier(IdKind::TimeBased);
            Ok(world.record_change(Record::Vote(Vote { id, target, retain })))
        })
    }

    /// Give `record` a new ordinal sorting strictly between the current
    /// ordinals of `before` and `after`.
    pub fn reorder_between(
        &mut self,
        record: RecordId,
        before: Option<RecordId>,
        after: Option<RecordId>,
    ) -> Result<RecordId> {
        self.require_user()?;
        self.expect_content(record)?;
        let left = self.neighbour_key(before)?;
        let right = self.neighbour_key(after)?;
        let key = order_key::allocate_between(left.as_deref(), right.as_deref(), self.ids.rng())?;
        self.in_transaction(|world| {
            let id = world.new_identifier(IdKind::TimeBased);
            Ok(world.record_change(Record::Ordinal(Ordinal {
                id,
                target: record,
                key,
            })))
        })
    }

    fn neighbour_key(&self, neighbour: Option<RecordId>) -> Result<Option<String>> {
        match neighbour {
            Some(id) => {
                self.expect_content(id)?;
                Ok(Some(self.ordinal_key(id)))
            }
            None => Ok(None),
        }
    }

    fn record_change(&mut self, record: Record) -> RecordId {
        let id = record.id();
        self.attach(record);
        self.changes.push(id);
        id
    }

    /// Index a record and link it into the histories it extends.
    pub(crate) fn attach(&mut self, record: Record) {
        match &record {
            Record::Item(item) => {
                self.items.push(item.id);
                if item.is_user() {
                    self.users.insert(item.id.pseudo_node(), item.id);
                }
            }
            Record::Entry(entry) => {
                if let Some(Record::Entry(previous)) =
                    entry.previous.and_then(|id| self.records.get_mut(&id))
                {
                    previous.successors.push(entry.id);
                }
                for (item, entry_ref) in entry.refs() {
                    if let Some(Record::Item(item)) = self.records.get_mut(&item) {
                        item.entries.push(entry_ref);
                    }
                }
            }
            Record::Vote(vote) => {
                if let Some(content) = self.records.get_mut(&vote.target).and_then(Record::content_mut) {
                    content.votes.push(vote.id);
                }
            }
            Record::Ordinal(ordinal) => {
                if let Some(content) =
                    self.records.get_mut(&ordinal.target).and_then(Record::content_mut)
                {
                    content.ordinals.push(ordinal.id);
                }
            }
        }
        self.records.insert(record.id(), record);
    }

    /// Append already-validated transactions, e.g. from an archive. Observers
    /// hear about the whole batch once.
    pub(crate) fn restore(&mut self, transactions: Vec<Vec<Record>>) -> Result<()> {
        if self.changes.depth() > 0 {
            return Err(Error::InvalidOperation(
                "cannot restore records inside an open transaction".into(),
            ));
        }
        let mut changes = Vec::new();
        for records in transactions {
            let ids: Vec<RecordId> = records.iter().map(Record::id).collect();
            for record in records {
                self.attach(record);
            }
            changes.extend(ids.iter().map(|id| (*id, self.touched_items(*id))));
            self.transactions.push(Transaction { records: ids });
        }
        let delivered = self.observers.deliver_item_changes(&changes) + self.refresh_queries();
        debug!(
            "event=restore module=world status=ok records={} notifications={delivered}",
            changes.len()
        );
        Ok(())
    }

    fn expect_kind(&self, id: RecordId, kind: RecordKind) -> Result<()> {
        match self.records.get(&id) {
            Some(record) if record.kind() == kind => Ok(()),
            Some(record) => Err(Error::InvalidOperation(format!(
                "{id} is a {}, expected a {kind}",
                record.kind()
            ))),
            None => Err(Error::UnknownRecord(id)),
        }
    }

    fn expect_content(&self, id: RecordId) -> Result<()> {
        match self.records.get(&id) {
            Some(record) if record.content().is_some() => Ok(()),
            Some(record) => Err(Error::InvalidOperation(format!(
                "{id} is a {} and cannot carry votes or ordinals",
                record.kind()
            ))),
            None => Err(Error::UnknownRecord(id)),
        }
    }

    fn missing(&self, id: RecordId, kind: RecordKind) -> Error {
        match self.records.get(&id) {
            Some(record) => Error::InvalidOperation(format!(
                "{id} is a {}, expected a {kind}",
                record.kind()
            )),
            None => Error::UnknownRecord(id),
        }
    }
}

// Reads.
impl<C: Clock> World<C> {
    pub fn get_record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn get_item_from_uuid(&self, id: RecordId) -> Option<&Item> {
        self.records.get(&id).and_then(Record::as_item)
    }

    pub fn entry(&self, id: RecordId) -> Option<&Entry> {
        self.records.get(&id).and_then(Record::as_entry)
    }

    pub fn entry_view(&self, entry_ref: EntryRef) -> Option<EntryView<'_>> {
        self.entry(entry_ref.entry)
            .map(|entry| entry.view(entry_ref.endpoint))
    }

    /// All items, axiomatic ones first, then in creation order.
    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items
            .iter()
            .filter_map(move |id| self.get_item_from_uuid(*id))
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn retrieval_filter(&self) -> RetrievalFilter {
        self.filter.into()
    }

    /// Switch the store-wide filter. Live queries are re-run immediately
    /// unless a transaction is open, in which case they re-run at its end.
    pub fn set_retrieval_filter(&mut self, mode: RetrievalFilter) -> Result<()> {
        self.filter = ActiveFilter::try_from(mode)?;
        debug!("event=filter_change module=world status=ok filter={mode}");
        if self.changes.depth() == 0 {
            self.refresh_queries();
        }
        Ok(())
    }

    /// User whose pseudo-node the identifier carries.
    pub fn creator(&self, id: RecordId) -> Option<RecordId> {
        id.timestamp()?;
        self.users.get(&id.pseudo_node()).copied()
    }

    pub fn creation_time(&self, id: RecordId) -> Option<DateTime<Utc>> {
        id.timestamp().map(Timestamp::to_datetime)
    }

    /// Vote, ordinal and successor history of a content record.
    pub fn history(&self, id: RecordId) -> Option<History<'_>> {
        let record = self.records.get(&id)?;
        let content = record.content()?;
        let votes = content
            .votes
            .iter()
            .filter_map(|vote| self.records.get(vote).and_then(Record::as_vote))
            .map(|vote| VoteFact {
                author: self.creator(vote.id),
                retain: vote.retain,
            })
            .collect();
        let ordinals = content
            .ordinals
            .iter()
            .filter_map(|ordinal| self.records.get(ordinal).and_then(Record::as_ordinal))
            .map(|ordinal| OrdinalFact {
                author: self.creator(ordinal.id),
                key: ordinal.key.as_str(),
            })
            .collect();
        let successors: Vec<Option<RecordId>> = record
            .as_entry()
            .map(|entry| entry.successors.iter().map(|id| self.creator(*id)).collect())
            .unwrap_or_default();
        Some(History {
            votes,
            ordinals,
            successors,
        })
    }

    pub fn resolve(&self, id: RecordId) -> Option<Resolution<'_>> {
        self.history(id).map(|history| self.filter.resolve(&history))
    }

    pub fn has_been_deleted(&self, id: RecordId) -> bool {
        self.resolve(id).map(|r| r.deleted).unwrap_or(false)
    }

    pub fn has_been_replaced(&self, entry: RecordId) -> bool {
        self.resolve(entry).map(|r| r.replaced).unwrap_or(false)
    }

    /// The filter-selected ordinal, or the creation-order key.
    pub fn ordinal_key(&self, id: RecordId) -> String {
        match self.resolve(id).and_then(|r| r.ordinal) {
            Some(key) => key.to_string(),
            None => order_key::creation_key(id.timestamp().unwrap_or_default()),
        }
    }

    pub fn compare_ordinals(&self, a: RecordId, b: RecordId) -> Ordering {
        order_key::compare_keys(&self.ordinal_key(a), &self.ordinal_key(b))
    }

    /// Every entry mentioning `item`, connection proxies included, in append
    /// order and regardless of deletion or replacement.
    pub fn entries_of(&self, item: RecordId) -> Vec<EntryView<'_>> {
        self.get_item_from_uuid(item)
            .map(|item| {
                item.entries
                    .iter()
                    .filter_map(|entry_ref| self.entry_view(*entry_ref))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entries for one attribute that are neither replaced nor deleted,
    /// sorted by ordinal.
    pub fn current_entries(&self, item: RecordId, attribute: RecordId) -> Vec<EntryView<'_>> {
        let mut entries: Vec<EntryView<'_>> = self
            .entries_of(item)
            .into_iter()
            .filter(|view| view.attribute() == attribute)
            .filter(|view| !self.has_been_replaced(view.id()) && !self.has_been_deleted(view.id()))
            .collect();
        entries.sort_by_cached_key(|view| self.ordinal_key(view.id()));
        entries
    }

    pub fn values(&self, item: RecordId, attribute: RecordId) -> Vec<Value> {
        self.current_entries(item, attribute)
            .iter()
            .map(EntryView::value)
            .collect()
    }

    pub fn value(&self, item: RecordId, attribute: RecordId) -> Option<Value> {
        self.current_entries(item, attribute)
            .first()
            .map(EntryView::value)
    }

    pub fn display_name(&self, item: RecordId) -> Option<String> {
        self.values(item, axioms::NAME.id())
            .into_iter()
            .find_map(|value| value.as_text().map(str::to_string))
            .or_else(|| axioms::lookup(item).map(|axiom| axiom.name().to_string()))
    }

    /// Attributes with at least one entry on `item`, in first-seen order.
    pub fn attributes_of(&self, item: RecordId) -> Vec<RecordId> {
        let mut attributes = Vec::new();
        for view in self.entries_of(item) {
            if !attributes.contains(&view.attribute()) {
                attributes.push(view.attribute());
            }
        }
        attributes
    }

    /// `entry` followed by each entry it replaced, back to the chain's root.
    pub fn entry_history(&self, entry: RecordId) -> Vec<RecordId> {
        let mut chain = Vec::new();
        let mut cursor = self.entry(entry);
        while let Some(current) = cursor {
            chain.push(current.id);
            cursor = current.previous.and_then(|id| self.entry(id));
        }
        chain
    }
}

// Observers and query runners.
impl<C: Clock> World<C> {
    pub fn observe_item(&mut self, item: RecordId) -> Subscription {
        self.observers.subscribe(Topic::Item(item))
    }

    pub fn observe_items(&mut self, items: Vec<RecordId>) -> Subscription {
        self.observers.subscribe(Topic::Items(items))
    }

    pub fn observe_query(&mut self, query: QueryId) -> Result<Subscription> {
        if !self.queries.contains_key(&query) {
            return Err(Error::UnknownQuery(query.get()));
        }
        Ok(self.observers.subscribe(Topic::Query(query)))
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        self.observers.unsubscribe(subscription)
    }

    /// Bind a live query; its results are kept current at every transaction
    /// end until [`World::end_of_life`].
    pub fn new_query_runner(&mut self, spec: QuerySpec) -> Result<QueryId> {
        match &spec {
            QuerySpec::Items(items) => {
                for item in items {
                    self.expect_kind(*item, RecordKind::Item)?;
                }
            }
            QuerySpec::Match { attribute, .. } => self.expect_kind(*attribute, RecordKind::Item)?,
            QuerySpec::Item(query) => self.expect_kind(*query, RecordKind::Item)?,
        }
        self.next_query += 1;
        let id = QueryId(self.next_query);
        let mut runner = QueryRunner::new(id);
        runner.bind(spec);
        runner.refresh(self);
        debug!(
            "event=query_create module=world status=ok query={id} results={}",
            runner.results().len()
        );
        self.queries.insert(id, runner);
        Ok(id)
    }

    pub fn query(&self, query: QueryId) -> Result<&QueryRunner> {
        self.queries
            .get(&query)
            .ok_or(Error::UnknownQuery(query.get()))
    }

    pub fn query_state(&self, query: QueryId) -> Result<QueryState> {
        self.query(query).map(QueryRunner::state)
    }

    /// Matching items the active filter does not consider deleted.
    pub fn get_result_items(&self, query: QueryId) -> Result<&[RecordId]> {
        self.query(query).map(QueryRunner::results)
    }

    pub fn does_item_match(&self, query: QueryId, item: RecordId) -> Result<bool> {
        let runner = self.query(query)?;
        Ok(runner.does_item_match(self, item))
    }

    /// Retire a runner. Its subscriptions are closed.
    pub fn end_of_life(&mut self, query: QueryId) -> Result<()> {
        self.queries
            .remove(&query)
            .ok_or(Error::UnknownQuery(query.get()))?;
        self.observers.forget_query(query);
        debug!("event=query_end module=world status=ok query={query}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ManualClock;
    use chrono::TimeZone;

    fn world() -> World<ManualClock> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        World::new(
            WorldConfig {
                seed: Some(11),
                ..WorldConfig::default()
            },
            clock,
        )
        .unwrap()
    }

    #[test]
    fn axioms_exist_but_are_not_logged() {
        let world = world();
        for axiom in axioms::ALL {
            assert!(world.get_item_from_uuid(axiom.id()).is_some());
            assert_eq!(world.display_name(axiom.id()).as_deref(), Some(axiom.name()));
        }
        assert!(world.transactions().is_empty());
        assert_eq!(
            world.creator(axioms::NAME.id()),
            Some(axioms::AXIOMATIC_USER.id())
        );
    }

    #[test]
    fn ids_carry_the_logged_in_user() {
        let mut world = world();
        let anonymous = world.new_identifier(IdKind::TimeBased);
        assert_eq!(world.creator(anonymous), None);

        let alice = world.new_user("Alice", None).unwrap();
        let item = world.new_item(Some("pen")).unwrap();
        assert_eq!(item.pseudo_node(), alice.pseudo_node());
        assert_eq!(world.creator(item), Some(alice));
        assert_eq!(world.creator(alice), Some(alice));
    }

    #[test]
    fn votes_on_votes_are_rejected() {
        let mut world = world();
        world.new_user("Alice", None).unwrap();
        let item = world.new_item(None).unwrap();
        let vote = world.vote_to_delete(item).unwrap();
        assert!(matches!(
            world.vote_to_retain(vote),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn failed_writes_leave_no_record() {
        let mut world = world();
        world.new_user("Alice", None).unwrap();
        let before = world.record_count();
        let ghost = RecordId::axiomatic(77_777);
        assert!(matches!(
            world.add_entry(ghost, axioms::NAME.id(), Value::text("x")),
            Err(Error::UnknownRecord(id)) if id == ghost
        ));
        assert_eq!(world.record_count(), before);
        assert_eq!(world.transaction_depth(), 0);
    }
}
