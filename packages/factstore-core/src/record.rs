use std::fmt;

use crate::ids::RecordId;
use crate::value::{DataType, Value};

/// Vote and ordinal history shared by items and entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentState {
    pub(crate) votes: Vec<RecordId>,
    pub(crate) ordinals: Vec<RecordId>,
}

impl ContentState {
    /// Votes in append order.
    pub fn votes(&self) -> &[RecordId] {
        &self.votes
    }

    /// Ordinals in append order.
    pub fn ordinals(&self) -> &[RecordId] {
        &self.ordinals
    }
}

/// Login credentials attached to an item that represents a user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub(crate) password: Option<String>,
}

impl Account {
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub(crate) fn accepts(&self, password: Option<&str>) -> bool {
        self.password.as_deref() == password
    }
}

/// Which half of a connection an item sees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    First,
    Second,
}

impl Endpoint {
    fn index(self) -> usize {
        match self {
            Endpoint::First => 0,
            Endpoint::Second => 1,
        }
    }

    fn other(self) -> usize {
        1 - self.index()
    }
}

/// How an item refers to one of its entries. Connections are listed once per
/// endpoint; both refer to the same stored entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryRef {
    pub entry: RecordId,
    pub endpoint: Option<Endpoint>,
}

/// A persistent identity accumulating entries.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub(crate) id: RecordId,
    pub(crate) content: ContentState,
    pub(crate) entries: Vec<EntryRef>,
    pub(crate) account: Option<Account>,
}

impl Item {
    pub(crate) fn new(id: RecordId) -> Self {
        Self {
            id,
            content: ContentState::default(),
            entries: Vec::new(),
            account: None,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn content(&self) -> &ContentState {
        &self.content
    }

    /// Every entry that mentions this item, in append order.
    pub fn entry_refs(&self) -> &[EntryRef] {
        &self.entries
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn is_user(&self) -> bool {
        self.account.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntryData {
    Literal {
        item: RecordId,
        attribute: RecordId,
        value: Value,
    },
    /// Symmetric link between `(items[0], attributes[0])` and
    /// `(items[1], attributes[1])`.
    Connection {
        items: [RecordId; 2],
        attributes: [RecordId; 2],
    },
}

/// One immutable fact. New facts replace old ones through `previous`.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub(crate) id: RecordId,
    pub(crate) content: ContentState,
    pub(crate) previous: Option<RecordId>,
    pub(crate) successors: Vec<RecordId>,
    pub(crate) data: EntryData,
}

impl Entry {
    pub(crate) fn new(id: RecordId, previous: Option<RecordId>, data: EntryData) -> Self {
        Self {
            id,
            content: ContentState::default(),
            previous,
            successors: Vec::new(),
            data,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn content(&self) -> &ContentState {
        &self.content
    }

    pub fn previous(&self) -> Option<RecordId> {
        self.previous
    }

    /// Entries that named this one as their previous value, in append order.
    pub fn successors(&self) -> &[RecordId] {
        &self.successors
    }

    pub fn data(&self) -> &EntryData {
        &self.data
    }

    pub fn data_type(&self) -> DataType {
        match &self.data {
            EntryData::Literal { value, .. } => value.data_type(),
            EntryData::Connection { .. } => DataType::Connection,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self.data, EntryData::Connection { .. })
    }

    /// Items this entry is attached to (two for connections).
    pub fn items(&self) -> Vec<RecordId> {
        match &self.data {
            EntryData::Literal { item, .. } => vec![*item],
            EntryData::Connection { items, .. } => items.to_vec(),
        }
    }

    /// References the attached items hold to this entry.
    pub(crate) fn refs(&self) -> Vec<(RecordId, EntryRef)> {
        match &self.data {
            EntryData::Literal { item, .. } => vec![(
                *item,
                EntryRef {
                    entry: self.id,
                    endpoint: None,
                },
            )],
            EntryData::Connection { items, .. } => [Endpoint::First, Endpoint::Second]
                .into_iter()
                .map(|endpoint| {
                    (
                        items[endpoint.index()],
                        EntryRef {
                            entry: self.id,
                            endpoint: Some(endpoint),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn view(&self, endpoint: Option<Endpoint>) -> EntryView<'_> {
        EntryView {
            entry: self,
            endpoint,
        }
    }
}

/// Read-only view of an entry from one item's perspective.
///
/// For connections this is the proxy each endpoint sees: it reports that
/// endpoint's item and attribute, and the opposite item as its value.
#[derive(Clone, Copy, Debug)]
pub struct EntryView<'a> {
    entry: &'a Entry,
    endpoint: Option<Endpoint>,
}

impl<'a> EntryView<'a> {
    pub fn id(&self) -> RecordId {
        self.entry.id
    }

    /// The shared stored entry behind this view.
    pub fn entry(&self) -> &'a Entry {
        self.entry
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint
    }

    pub fn is_proxy(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn item(&self) -> RecordId {
        match &self.entry.data {
            EntryData::Literal { item, .. } => *item,
            EntryData::Connection { items, .. } => items[self.side()],
        }
    }

    pub fn attribute(&self) -> RecordId {
        match &self.entry.data {
            EntryData::Literal { attribute, .. } => *attribute,
            EntryData::Connection { attributes, .. } => attributes[self.side()],
        }
    }

    pub fn value(&self) -> Value {
        match &self.entry.data {
            EntryData::Literal { value, .. } => value.clone(),
            EntryData::Connection { items, .. } => {
                Value::Item(items[self.endpoint.unwrap_or(Endpoint::First).other()])
            }
        }
    }

    pub fn data_type(&self) -> DataType {
        self.entry.data_type()
    }

    pub fn previous(&self) -> Option<RecordId> {
        self.entry.previous
    }

    fn side(&self) -> usize {
        self.endpoint.unwrap_or(Endpoint::First).index()
    }
}

/// Assertion that a content record should be kept or treated as deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub id: RecordId,
    pub target: RecordId,
    pub retain: bool,
}

/// Assertion of a content record's sort position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ordinal {
    pub id: RecordId,
    pub target: RecordId,
    pub key: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Item,
    Entry,
    Vote,
    Ordinal,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Item => "item",
            RecordKind::Entry => "entry",
            RecordKind::Vote => "vote",
            RecordKind::Ordinal => "ordinal",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Item(Item),
    Entry(Entry),
    Vote(Vote),
    Ordinal(Ordinal),
}

impl Record {
    pub fn id(&self) -> RecordId {
        match self {
            Record::Item(item) => item.id,
            Record::Entry(entry) => entry.id,
            Record::Vote(vote) => vote.id,
            Record::Ordinal(ordinal) => ordinal.id,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Item(_) => RecordKind::Item,
            Record::Entry(_) => RecordKind::Entry,
            Record::Vote(_) => RecordKind::Vote,
            Record::Ordinal(_) => RecordKind::Ordinal,
        }
    }

    /// Vote/ordinal history; `None` for votes and ordinals themselves.
    pub fn content(&self) -> Option<&ContentState> {
        match self {
            Record::Item(item) => Some(&item.content),
            Record::Entry(entry) => Some(&entry.content),
            Record::Vote(_) | Record::Ordinal(_) => None,
        }
    }

    pub(crate) fn content_mut(&mut self) -> Option<&mut ContentState> {
        match self {
            Record::Item(item) => Some(&mut item.content),
            Record::Entry(entry) => Some(&mut entry.content),
            Record::Vote(_) | Record::Ordinal(_) => None,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Record::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Record::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_vote(&self) -> Option<&Vote> {
        match self {
            Record::Vote(vote) => Some(vote),
            _ => None,
        }
    }

    pub fn as_ordinal(&self) -> Option<&Ordinal> {
        match self {
            Record::Ordinal(ordinal) => Some(ordinal),
            _ => None,
        }
    }
}

/// Records created together in one editing burst.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub(crate) records: Vec<RecordId>,
}

impl Transaction {
    pub fn records(&self) -> &[RecordId] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
