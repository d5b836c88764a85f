//! Items every store starts with. Their identifiers are constant across
//! stores and they never appear in archives.

use crate::ids::RecordId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Axiom {
    ordinal: u64,
    name: &'static str,
}

impl Axiom {
    pub fn id(self) -> RecordId {
        RecordId::axiomatic(self.ordinal)
    }

    pub fn name(self) -> &'static str {
        self.name
    }
}

/// Author of the axiomatic items themselves.
pub const AXIOMATIC_USER: Axiom = Axiom {
    ordinal: 1,
    name: "axiomatic user",
};
pub const NAME: Axiom = Axiom {
    ordinal: 2,
    name: "name",
};
pub const CATEGORY: Axiom = Axiom {
    ordinal: 3,
    name: "category",
};
/// Attribute of a query item naming the attribute to match on.
pub const QUERY_MATCHING_ATTRIBUTE: Axiom = Axiom {
    ordinal: 4,
    name: "query matching attribute",
};
/// Attribute of a query item listing the accepted values.
pub const QUERY_MATCHING_VALUE: Axiom = Axiom {
    ordinal: 5,
    name: "query matching value",
};
pub const ATTRIBUTE: Axiom = Axiom {
    ordinal: 6,
    name: "Attribute",
};
pub const PERSON: Axiom = Axiom {
    ordinal: 7,
    name: "Person",
};

pub const ALL: [Axiom; 7] = [
    AXIOMATIC_USER,
    NAME,
    CATEGORY,
    QUERY_MATCHING_ATTRIBUTE,
    QUERY_MATCHING_VALUE,
    ATTRIBUTE,
    PERSON,
];

pub fn lookup(id: RecordId) -> Option<Axiom> {
    ALL.into_iter().find(|axiom| axiom.id() == id)
}

pub fn is_axiomatic(id: RecordId) -> bool {
    lookup(id).is_some()
}
