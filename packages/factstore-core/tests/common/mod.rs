#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use factstore_core::{ManualClock, RecordId, Value, World, WorldConfig};

pub fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap())
}

pub fn world() -> World<ManualClock> {
    world_with(WorldConfig {
        seed: Some(42),
        ..WorldConfig::default()
    })
}

pub fn world_with(config: WorldConfig) -> World<ManualClock> {
    World::new(config, clock()).unwrap()
}

/// A store with `name` logged in.
pub fn world_as(name: &str) -> (World<ManualClock>, RecordId) {
    let mut world = world();
    let user = world.new_user(name, None).unwrap();
    (world, user)
}

pub fn tick(world: &World<ManualClock>) {
    world.clock().advance(Duration::milliseconds(1));
}

pub fn names(world: &World<ManualClock>, items: &[RecordId]) -> Vec<String> {
    items
        .iter()
        .map(|item| world.display_name(*item).unwrap_or_default())
        .collect()
}

pub fn text(value: &str) -> Value {
    Value::text(value)
}
