mod common;

use common::text;
use factstore_core::{Error, RetrievalFilter, WorldConfig};

#[test]
fn democratic_filter_is_rejected_up_front() {
    let config = WorldConfig {
        retrieval_filter: RetrievalFilter::Democratic,
        seed: Some(1),
    };
    assert!(matches!(
        factstore_core::World::new(config, common::clock()),
        Err(Error::UnsupportedFilter(_))
    ));

    let mut world = common::world();
    assert!(matches!(
        world.set_retrieval_filter(RetrievalFilter::Democratic),
        Err(Error::UnsupportedFilter(_))
    ));
    assert_eq!(world.retrieval_filter(), RetrievalFilter::LastEditWins);
}

#[test]
fn single_user_view_ignores_other_authors() {
    let mut world = common::world();
    let alice = world.new_user("Alice", None).unwrap();
    let status = world.new_attribute("status").unwrap();
    let task = world.new_item(Some("task")).unwrap();
    let open = world.add_entry(task, status, text("open")).unwrap();
    world.logout();

    let bob = world.new_user("Bob", Some("hunter2")).unwrap();
    world.replace_entry(open, text("closed")).unwrap();
    world.vote_to_delete(task).unwrap();

    assert!(world.has_been_deleted(task));
    assert_eq!(world.values(task, status), vec![text("closed")]);

    world
        .set_retrieval_filter(RetrievalFilter::SingleUser(alice))
        .unwrap();
    assert!(!world.has_been_deleted(task));
    assert!(!world.has_been_replaced(open));
    // Bob's entry is still a fact; it just no longer supersedes Alice's
    assert_eq!(world.values(task, status), vec![text("open"), text("closed")]);

    world
        .set_retrieval_filter(RetrievalFilter::SingleUser(bob))
        .unwrap();
    assert!(world.has_been_deleted(task));
    assert_eq!(world.values(task, status), vec![text("closed")]);
}

#[test]
fn single_user_ordinals_fall_back_to_creation_order() {
    let mut world = common::world();
    let alice = world.new_user("Alice", None).unwrap();
    let first = world.new_item(Some("first")).unwrap();
    let second = world.new_item(Some("second")).unwrap();
    world.logout();

    world.new_user("Bob", None).unwrap();
    world.reorder_between(second, None, Some(first)).unwrap();
    assert!(world.ordinal_key(second) < world.ordinal_key(first));

    world
        .set_retrieval_filter(RetrievalFilter::SingleUser(alice))
        .unwrap();
    assert!(world.ordinal_key(first) < world.ordinal_key(second));
}

#[test]
fn unabridged_view_shows_everything() {
    let config = WorldConfig {
        retrieval_filter: RetrievalFilter::Unabridged,
        seed: Some(5),
    };
    let mut world = common::world_with(config);
    world.new_user("Alice", None).unwrap();
    let note = world.new_attribute("note").unwrap();
    let item = world.new_item(Some("pad")).unwrap();
    let first = world.add_entry(item, note, text("v1")).unwrap();
    world.replace_entry(first, text("v2")).unwrap();
    world.vote_to_delete(item).unwrap();

    assert!(!world.has_been_deleted(item));
    assert!(!world.has_been_replaced(first));
    assert_eq!(world.values(item, note), vec![text("v1"), text("v2")]);
}
