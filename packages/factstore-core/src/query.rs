//! Live queries over the store.
//!
//! A runner is bound to one [`QuerySpec`] and re-evaluated by the store at
//! the end of every outermost transaction. Results exclude items the active
//! retrieval filter considers deleted.

use std::fmt;

use crate::axioms;
use crate::ids::RecordId;
use crate::traits::Clock;
use crate::value::Value;
use crate::world::World;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct QueryId(pub(crate) u64);

impl QueryId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum QuerySpec {
    /// A fixed list, kept in the given order.
    Items(Vec<RecordId>),
    /// Items with a current entry for `attribute` equal to one of `values`.
    Match {
        attribute: RecordId,
        values: Vec<Value>,
    },
    /// A query item whose `query matching attribute` and
    /// `query matching value` entries describe a match. Editing the query
    /// item changes the results.
    Item(RecordId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryState {
    Idle,
    Bound,
    Live,
}

#[derive(Clone, Debug)]
pub struct QueryRunner {
    id: QueryId,
    spec: Option<QuerySpec>,
    state: QueryState,
    results: Vec<RecordId>,
}

impl QueryRunner {
    pub fn new(id: QueryId) -> Self {
        Self {
            id,
            spec: None,
            state: QueryState::Idle,
            results: Vec::new(),
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn spec(&self) -> Option<&QuerySpec> {
        self.spec.as_ref()
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn results(&self) -> &[RecordId] {
        &self.results
    }

    /// Attach a spec. Results stay empty until the next refresh.
    pub fn bind(&mut self, spec: QuerySpec) {
        self.spec = Some(spec);
        self.results.clear();
        self.state = QueryState::Bound;
    }

    /// Re-evaluate against `world`. Returns whether the results changed.
    pub fn refresh<C: Clock>(&mut self, world: &World<C>) -> bool {
        let Some(spec) = &self.spec else {
            return false;
        };
        let results = match spec {
            QuerySpec::Items(items) => items
                .iter()
                .copied()
                .filter(|item| world.get_item_from_uuid(*item).is_some())
                .filter(|item| !world.has_been_deleted(*item))
                .collect(),
            QuerySpec::Match { attribute, values } => match_items(world, *attribute, values),
            QuerySpec::Item(query) => match read_query_item(world, *query) {
                Some((attribute, values)) => match_items(world, attribute, &values),
                None => Vec::new(),
            },
        };
        self.state = QueryState::Live;
        if results == self.results {
            return false;
        }
        self.results = results;
        true
    }

    pub fn does_item_match<C: Clock>(&self, world: &World<C>, item: RecordId) -> bool {
        if world.get_item_from_uuid(item).is_none() || world.has_been_deleted(item) {
            return false;
        }
        match &self.spec {
            None => false,
            Some(QuerySpec::Items(items)) => items.contains(&item),
            Some(QuerySpec::Match { attribute, values }) => {
                has_matching_value(world, item, *attribute, values)
            }
            Some(QuerySpec::Item(query)) => read_query_item(world, *query)
                .map(|(attribute, values)| has_matching_value(world, item, attribute, &values))
                .unwrap_or(false),
        }
    }
}

fn read_query_item<C: Clock>(world: &World<C>, query: RecordId) -> Option<(RecordId, Vec<Value>)> {
    let attribute = world
        .values(query, axioms::QUERY_MATCHING_ATTRIBUTE.id())
        .into_iter()
        .find_map(|value| value.as_item())?;
    let values = world.values(query, axioms::QUERY_MATCHING_VALUE.id());
    Some((attribute, values))
}

fn has_matching_value<C: Clock>(
    world: &World<C>,
    item: RecordId,
    attribute: RecordId,
    values: &[Value],
) -> bool {
    world
        .values(item, attribute)
        .iter()
        .any(|value| values.contains(value))
}

fn match_items<C: Clock>(world: &World<C>, attribute: RecordId, values: &[Value]) -> Vec<RecordId> {
    let mut matches: Vec<RecordId> = world
        .items()
        .map(|item| item.id())
        .filter(|item| !world.has_been_deleted(*item))
        .filter(|item| has_matching_value(world, *item, attribute, values))
        .collect();
    matches.sort_by_cached_key(|id| world.ordinal_key(*id));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ManualClock;
    use crate::world::WorldConfig;
    use chrono::{Duration, TimeZone, Utc};

    fn world() -> World<ManualClock> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        World::new(
            WorldConfig {
                seed: Some(3),
                ..WorldConfig::default()
            },
            clock,
        )
        .unwrap()
    }

    #[test]
    fn runner_moves_from_idle_to_live() {
        let mut world = world();
        world.new_user("Alice", None).unwrap();
        let pen = world.new_item(Some("pen")).unwrap();

        let mut runner = QueryRunner::new(QueryId(1));
        assert_eq!(runner.state(), QueryState::Idle);
        assert!(!runner.refresh(&world));
        assert_eq!(runner.state(), QueryState::Idle);

        runner.bind(QuerySpec::Items(vec![pen]));
        assert_eq!(runner.state(), QueryState::Bound);
        assert!(runner.results().is_empty());

        assert!(runner.refresh(&world));
        assert_eq!(runner.state(), QueryState::Live);
        assert_eq!(runner.results(), &[pen]);
        assert!(!runner.refresh(&world));
    }

    #[test]
    fn query_item_spec_follows_its_entries() {
        let mut world = world();
        world.new_user("Alice", None).unwrap();
        let colour = world.new_attribute("colour").unwrap();
        let red = world.new_item(Some("red thing")).unwrap();
        world.add_entry(red, colour, Value::text("red")).unwrap();
        world.clock().advance(Duration::seconds(1));
        let blue = world.new_item(Some("blue thing")).unwrap();
        world.add_entry(blue, colour, Value::text("blue")).unwrap();

        let query = world.new_item(Some("colour query")).unwrap();
        world
            .add_entry(query, axioms::QUERY_MATCHING_ATTRIBUTE.id(), Value::Item(colour))
            .unwrap();
        let wanted = world
            .add_entry(query, axioms::QUERY_MATCHING_VALUE.id(), Value::text("red"))
            .unwrap();

        let mut runner = QueryRunner::new(QueryId(7));
        runner.bind(QuerySpec::Item(query));
        runner.refresh(&world);
        assert_eq!(runner.results(), &[red]);
        assert!(runner.does_item_match(&world, red));
        assert!(!runner.does_item_match(&world, blue));

        world.replace_entry(wanted, Value::text("blue")).unwrap();
        assert!(runner.refresh(&world));
        assert_eq!(runner.results(), &[blue]);
    }

    #[test]
    fn query_item_without_attribute_matches_nothing() {
        let mut world = world();
        world.new_user("Alice", None).unwrap();
        let query = world.new_item(Some("empty query")).unwrap();
        let mut runner = QueryRunner::new(QueryId(2));
        runner.bind(QuerySpec::Item(query));
        assert!(!runner.refresh(&world));
        assert_eq!(runner.state(), QueryState::Live);
        assert!(runner.results().is_empty());
    }
}
