//! Retrieval filters: store-wide policies that collapse a record's vote,
//! ordinal and replacement history into one current view.
//!
//! Votes and ordinals are resolved by append order, never by comparing
//! embedded timestamps: two assertions made within the same clock tick must
//! still have a definite winner.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::RecordId;

/// Store-wide retrieval mode as selected by callers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RetrievalFilter {
    /// The last appended assertion decides.
    #[default]
    LastEditWins,
    /// Only assertions created by the given user count.
    SingleUser(RecordId),
    /// Majority vote. Not supported: selecting it fails.
    Democratic,
    /// Full history, nothing hidden.
    Unabridged,
}

impl fmt::Display for RetrievalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalFilter::LastEditWins => f.write_str("last-edit-wins"),
            RetrievalFilter::SingleUser(user) => write!(f, "single-user({user})"),
            RetrievalFilter::Democratic => f.write_str("democratic"),
            RetrievalFilter::Unabridged => f.write_str("unabridged"),
        }
    }
}

/// A retrieval mode the store can actually evaluate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActiveFilter {
    LastEditWins,
    SingleUser(RecordId),
    Unabridged,
}

impl TryFrom<RetrievalFilter> for ActiveFilter {
    type Error = Error;

    fn try_from(mode: RetrievalFilter) -> Result<Self> {
        match mode {
            RetrievalFilter::LastEditWins => Ok(ActiveFilter::LastEditWins),
            RetrievalFilter::SingleUser(user) => Ok(ActiveFilter::SingleUser(user)),
            RetrievalFilter::Unabridged => Ok(ActiveFilter::Unabridged),
            RetrievalFilter::Democratic => Err(Error::UnsupportedFilter(
                "democratic vote counting has no defined semantics".into(),
            )),
        }
    }
}

impl From<ActiveFilter> for RetrievalFilter {
    fn from(filter: ActiveFilter) -> Self {
        match filter {
            ActiveFilter::LastEditWins => RetrievalFilter::LastEditWins,
            ActiveFilter::SingleUser(user) => RetrievalFilter::SingleUser(user),
            ActiveFilter::Unabridged => RetrievalFilter::Unabridged,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteFact {
    pub author: Option<RecordId>,
    pub retain: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrdinalFact<'a> {
    pub author: Option<RecordId>,
    pub key: &'a str,
}

/// Everything asserted about one content record, in append order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct History<'a> {
    pub votes: Vec<VoteFact>,
    pub ordinals: Vec<OrdinalFact<'a>>,
    /// Authors of the entries that replaced this one.
    pub successors: Vec<Option<RecordId>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub deleted: bool,
    /// `None` means the record falls back to its creation-order key.
    pub ordinal: Option<&'a str>,
    pub replaced: bool,
}

impl ActiveFilter {
    pub fn resolve<'a>(&self, history: &History<'a>) -> Resolution<'a> {
        Resolution {
            deleted: self.is_deleted(&history.votes),
            ordinal: self.ordinal(&history.ordinals),
            replaced: self.is_replaced(&history.successors),
        }
    }

    pub fn is_deleted(&self, votes: &[VoteFact]) -> bool {
        if *self == ActiveFilter::Unabridged {
            return false;
        }
        votes
            .iter()
            .rev()
            .find(|vote| self.admits(vote.author))
            .map(|vote| !vote.retain)
            .unwrap_or(false)
    }

    pub fn ordinal<'a>(&self, ordinals: &[OrdinalFact<'a>]) -> Option<&'a str> {
        ordinals
            .iter()
            .rev()
            .find(|ordinal| self.admits(ordinal.author))
            .map(|ordinal| ordinal.key)
    }

    pub fn is_replaced(&self, successors: &[Option<RecordId>]) -> bool {
        match self {
            ActiveFilter::Unabridged => false,
            _ => successors.iter().any(|author| self.admits(*author)),
        }
    }

    fn admits(&self, author: Option<RecordId>) -> bool {
        match self {
            ActiveFilter::SingleUser(user) => author == Some(*user),
            ActiveFilter::LastEditWins | ActiveFilter::Unabridged => true,
        }
    }
}
