#![forbid(unsafe_code)]
//! Versioned multi-user record store.
//! Records are never edited: entries replace each other through chains, and
//! votes and ordinals accumulate as history that a store-wide retrieval
//! filter collapses into the current view. Live query runners and observers
//! are notified once per committed transaction.

#[cfg(feature = "serde")]
pub mod archive;
pub mod axioms;
pub mod error;
pub mod filter;
pub mod ids;
pub mod observer;
pub mod order_key;
pub mod query;
pub mod record;
pub mod traits;
pub mod value;
pub mod world;

pub use error::{Error, Result};
pub use filter::{ActiveFilter, History, Resolution, RetrievalFilter};
pub use ids::{IdGenerator, IdKind, IdVariant, PseudoNode, RecordId, Timestamp};
pub use observer::{Notification, Subscription, SubscriptionId, Topic};
pub use query::{QueryId, QueryRunner, QuerySpec, QueryState};
pub use record::{
    Account, ContentState, Endpoint, Entry, EntryData, EntryRef, EntryView, Item, Ordinal,
    Record, RecordKind, Transaction, Vote,
};
pub use traits::{Clock, ManualClock, SystemClock};
pub use value::{DataType, Value};
pub use world::{World, WorldConfig};
