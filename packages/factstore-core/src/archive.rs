//! JSON archive of the transaction log.
//!
//! Every record is a single-key object naming its class. A transaction with
//! more than one wire record is wrapped in `TransactionClass`; a lone record
//! is written bare. Axiomatic items are never written.

use std::collections::HashMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::RecordId;
use crate::order_key;
use crate::record::{Account, Entry, EntryData, Item, Ordinal, Record, RecordKind, Vote};
use crate::traits::{Clock, SystemClock};
use crate::value::{DataType, Value};
use crate::world::{World, WorldConfig};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum WireRecord {
    ItemClass(WireItem),
    UserClass(WireUser),
    EntryClass(WireEntry),
    VoteClass(WireVote),
    OrdinalClass(WireOrdinal),
    TransactionClass(Vec<WireRecord>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct WireItem {
    uuid: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct WireUser {
    user: String,
    password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntry {
    uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_value: Option<String>,
    #[serde(rename = "type")]
    data_type: String,
    item: WireRef,
    attribute: WireRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

/// A scalar identifier, or one per endpoint for connections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum WireRef {
    One(String),
    Pair([String; 2]),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVote {
    uuid: String,
    record: String,
    retain_flag: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOrdinal {
    uuid: String,
    record: String,
    ordinal_number: String,
}

/// Serialize every committed transaction in commit order.
pub fn to_json<C: Clock>(world: &World<C>) -> Result<String> {
    let mut out = Vec::new();
    let mut written = 0;
    for transaction in world.transactions() {
        let mut group = Vec::new();
        for id in transaction.records() {
            if let Some(record) = world.get_record(*id) {
                encode_record(record, &mut group);
            }
        }
        written += group.len();
        match group.len() {
            0 => {}
            1 => out.extend(group),
            _ => out.push(WireRecord::TransactionClass(group)),
        }
    }
    let json = serde_json::to_string(&out)?;
    info!(
        "event=archive_save module=archive status=ok transactions={} records={written}",
        world.transactions().len()
    );
    Ok(json)
}

/// Append an archive's transactions to `world`. Nothing is applied unless
/// the whole archive validates.
pub fn load<C: Clock>(world: &mut World<C>, json: &str) -> Result<usize> {
    if world.transaction_depth() > 0 {
        return Err(Error::InvalidOperation(
            "cannot load an archive inside an open transaction".into(),
        ));
    }
    let wire: Vec<WireRecord> = serde_json::from_str(json)?;
    let mut stage = Stage {
        world: &*world,
        kinds: HashMap::new(),
        transactions: Vec::new(),
    };
    for record in wire {
        match record {
            WireRecord::TransactionClass(group) => {
                stage.transactions.push(Vec::new());
                for record in group {
                    stage.push(record)?;
                }
            }
            WireRecord::UserClass(user) => {
                return Err(Error::InvalidArchive(format!(
                    "UserClass {} must share a TransactionClass with its ItemClass",
                    user.user
                )))
            }
            record => {
                stage.transactions.push(Vec::new());
                stage.push(record)?;
            }
        }
    }
    let Stage {
        kinds,
        mut transactions,
        ..
    } = stage;
    transactions.retain(|group| !group.is_empty());
    let count = transactions.len();
    world.restore(transactions)?;
    info!(
        "event=archive_load module=archive status=ok transactions={count} records={}",
        kinds.len()
    );
    Ok(count)
}

/// A fresh store with default settings holding the archive's history.
pub fn from_json(json: &str) -> Result<World<SystemClock>> {
    let mut world = World::new(WorldConfig::default(), SystemClock)?;
    load(&mut world, json)?;
    Ok(world)
}

fn encode_record(record: &Record, out: &mut Vec<WireRecord>) {
    match record {
        Record::Item(item) => {
            out.push(WireRecord::ItemClass(WireItem {
                uuid: item.id().to_string(),
            }));
            if let Some(account) = item.account() {
                out.push(WireRecord::UserClass(WireUser {
                    user: item.id().to_string(),
                    password: account.password.clone(),
                }));
            }
        }
        Record::Entry(entry) => {
            let (item, attribute, value) = match entry.data() {
                EntryData::Literal {
                    item,
                    attribute,
                    value,
                } => (
                    WireRef::One(item.to_string()),
                    WireRef::One(attribute.to_string()),
                    Some(value.encode()),
                ),
                EntryData::Connection { items, attributes } => (
                    WireRef::Pair(items.map(|id| id.to_string())),
                    WireRef::Pair(attributes.map(|id| id.to_string())),
                    None,
                ),
            };
            out.push(WireRecord::EntryClass(WireEntry {
                uuid: entry.id().to_string(),
                previous_value: entry.previous().map(|id| id.to_string()),
                data_type: entry.data_type().tag().to_string(),
                item,
                attribute,
                value,
            }));
        }
        Record::Vote(vote) => out.push(WireRecord::VoteClass(WireVote {
            uuid: vote.id.to_string(),
            record: vote.target.to_string(),
            retain_flag: vote.retain.to_string(),
        })),
        Record::Ordinal(ordinal) => out.push(WireRecord::OrdinalClass(WireOrdinal {
            uuid: ordinal.id.to_string(),
            record: ordinal.target.to_string(),
            ordinal_number: ordinal.key.clone(),
        })),
    }
}

/// Records decoded so far, grouped by transaction, not yet in the store.
struct Stage<'w, C: Clock> {
    world: &'w World<C>,
    kinds: HashMap<RecordId, RecordKind>,
    transactions: Vec<Vec<Record>>,
}

impl<C: Clock> Stage<'_, C> {
    fn push(&mut self, wire: WireRecord) -> Result<()> {
        let record = match wire {
            WireRecord::ItemClass(item) => Record::Item(Item::new(self.fresh(&item.uuid)?)),
            WireRecord::UserClass(user) => return self.attach_account(user),
            WireRecord::EntryClass(entry) => Record::Entry(self.decode_entry(entry)?),
            WireRecord::VoteClass(vote) => {
                let retain = match vote.retain_flag.as_str() {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(Error::InvalidArchive(format!(
                            "retainFlag must be \"true\" or \"false\", got `{other}`"
                        )))
                    }
                };
                Record::Vote(Vote {
                    id: self.fresh(&vote.uuid)?,
                    target: self.content(&vote.record)?,
                    retain,
                })
            }
            WireRecord::OrdinalClass(ordinal) => {
                order_key::validate(&ordinal.ordinal_number)
                    .map_err(|err| Error::InvalidArchive(err.to_string()))?;
                Record::Ordinal(Ordinal {
                    id: self.fresh(&ordinal.uuid)?,
                    target: self.content(&ordinal.record)?,
                    key: ordinal.ordinal_number,
                })
            }
            WireRecord::TransactionClass(_) => {
                return Err(Error::InvalidArchive("nested TransactionClass".into()))
            }
        };
        self.kinds.insert(record.id(), record.kind());
        if let Some(group) = self.transactions.last_mut() {
            group.push(record);
        }
        Ok(())
    }

    fn decode_entry(&self, wire: WireEntry) -> Result<Entry> {
        let id = self.fresh(&wire.uuid)?;
        let previous = match &wire.previous_value {
            Some(previous) => Some(self.reference(previous, RecordKind::Entry)?),
            None => None,
        };
        let data_type = DataType::from_tag(&wire.data_type)?;
        let data = match (data_type, wire.item, wire.attribute) {
            (DataType::Connection, WireRef::Pair(items), WireRef::Pair(attributes)) => {
                EntryData::Connection {
                    items: [
                        self.reference(&items[0], RecordKind::Item)?,
                        self.reference(&items[1], RecordKind::Item)?,
                    ],
                    attributes: [
                        self.reference(&attributes[0], RecordKind::Item)?,
                        self.reference(&attributes[1], RecordKind::Item)?,
                    ],
                }
            }
            (DataType::Connection, _, _) => {
                return Err(Error::InvalidArchive(format!(
                    "connection {id} needs two items and two attributes"
                )))
            }
            (data_type, WireRef::One(item), WireRef::One(attribute)) => {
                let raw = wire.value.ok_or_else(|| {
                    Error::InvalidArchive(format!("entry {id} has no value"))
                })?;
                let value = Value::decode(data_type, &raw)?;
                if let Value::Item(target) = &value {
                    self.reference(&target.to_string(), RecordKind::Item)?;
                }
                EntryData::Literal {
                    item: self.reference(&item, RecordKind::Item)?,
                    attribute: self.reference(&attribute, RecordKind::Item)?,
                    value,
                }
            }
            (data_type, _, _) => {
                return Err(Error::InvalidArchive(format!(
                    "{data_type} entry {id} must reference a single item and attribute"
                )))
            }
        };
        Ok(Entry::new(id, previous, data))
    }

    fn attach_account(&mut self, wire: WireUser) -> Result<()> {
        let user = RecordId::parse(&wire.user)?;
        let item = self
            .transactions
            .last_mut()
            .into_iter()
            .flat_map(|group| group.iter_mut().rev())
            .find_map(|record| match record {
                Record::Item(item) if item.id() == user => Some(item),
                _ => None,
            })
            .ok_or_else(|| {
                Error::InvalidArchive(format!("UserClass {user} does not follow its ItemClass"))
            })?;
        item.account = Some(Account {
            password: wire.password,
        });
        Ok(())
    }

    fn kind_of(&self, id: RecordId) -> Option<RecordKind> {
        self.kinds
            .get(&id)
            .copied()
            .or_else(|| self.world.get_record(id).map(Record::kind))
    }

    fn fresh(&self, raw: &str) -> Result<RecordId> {
        let id = RecordId::parse(raw)?;
        if self.kind_of(id).is_some() {
            return Err(Error::InvalidArchive(format!("duplicate uuid {id}")));
        }
        Ok(id)
    }

    fn reference(&self, raw: &str, kind: RecordKind) -> Result<RecordId> {
        let id = RecordId::parse(raw)?;
        match self.kind_of(id) {
            Some(found) if found == kind => Ok(id),
            Some(found) => Err(Error::InvalidArchive(format!(
                "{id} is a {found}, expected a {kind}"
            ))),
            None => Err(Error::InvalidArchive(format!("unresolved reference {id}"))),
        }
    }

    fn content(&self, raw: &str) -> Result<RecordId> {
        let id = RecordId::parse(raw)?;
        match self.kind_of(id) {
            Some(RecordKind::Item | RecordKind::Entry) => Ok(id),
            Some(found) => Err(Error::InvalidArchive(format!(
                "{id} is a {found} and cannot carry votes or ordinals"
            ))),
            None => Err(Error::InvalidArchive(format!("unresolved reference {id}"))),
        }
    }
}
