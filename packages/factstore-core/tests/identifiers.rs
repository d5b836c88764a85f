mod common;

use chrono::{Duration, TimeZone, Utc};
use factstore_core::{Error, IdKind, IdVariant, RecordId, Timestamp};

#[test]
fn creation_time_survives_the_identifier() {
    let mut world = common::world();
    let instant = Utc.with_ymd_and_hms(2031, 2, 3, 4, 5, 6).unwrap() + Duration::nanoseconds(123_456_700);
    world.clock().set(instant);

    let id = world.new_identifier(IdKind::TimeBased);
    let parsed = RecordId::parse(&id.to_string()).unwrap();
    assert_eq!(parsed, id);
    assert_eq!(world.creation_time(parsed), Some(instant));
}

#[test]
fn sub_tick_precision_is_truncated() {
    let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::nanoseconds(199);
    let ts = Timestamp::from_datetime(instant);
    assert_eq!(ts.to_datetime(), instant - Duration::nanoseconds(99));
}

#[test]
fn identifiers_are_strictly_increasing_under_a_frozen_clock() {
    let mut world = common::world();
    let mut last: Option<Timestamp> = None;
    for _ in 0..1_000 {
        let ts = world.new_identifier(IdKind::TimeBased).timestamp().unwrap();
        if let Some(previous) = last {
            assert!(ts > previous);
        }
        last = Some(ts);
    }
}

#[test]
fn identifiers_stay_monotonic_when_the_clock_steps_back() {
    let mut world = common::world();
    let first = world.new_identifier(IdKind::TimeBased);
    world.clock().advance(Duration::seconds(-30));
    let second = world.new_identifier(IdKind::TimeBased);
    assert!(second.timestamp().unwrap() > first.timestamp().unwrap());
}

#[test]
fn random_identifiers_have_no_timestamp() {
    let mut world = common::world();
    let id = world.new_identifier(IdKind::Random);
    assert_eq!(id.version(), 4);
    assert_eq!(id.variant(), IdVariant::Rfc4122);
    assert_eq!(id.timestamp(), None);
    assert_eq!(world.creation_time(id), None);
    assert_eq!(world.creator(id), None);
}

#[test]
fn malformed_identifiers_are_rejected() {
    let cases = [
        "",
        "0a6f2b3c1d2e11ef80000123456789ab",
        "0a6f2b3c-1d2e-11ef-8000-0123456789a",
        "0a6f2b3c-1d2e-11ef-8000-0123456789abc",
        "0a6f2b3c1-d2e-11ef-8000-0123456789ab",
        "0a6f2b3c-1d2e-11ef-8000-0123456789ag",
        "{a6f2b3c-1d2e-11ef-8000-0123456789a}",
        "0a6f2b3c-1d2e-11ef-8000+0123456789ab",
    ];
    for case in cases {
        assert!(
            matches!(RecordId::parse(case), Err(Error::InvalidIdentifier(_))),
            "accepted {case:?}"
        );
    }
}

#[test]
fn version_and_variant_are_decoded() {
    let v1 = RecordId::parse("0a6f2b3c-1d2e-11ef-8000-0123456789ab").unwrap();
    assert_eq!(v1.version(), 1);
    assert_eq!(v1.variant(), IdVariant::Rfc4122);
    assert_eq!(v1.pseudo_node(), [0x01, 0x23, 0x45, 0x67, 0x89, 0xab]);

    let ncs = RecordId::parse("0a6f2b3c-1d2e-11ef-7000-0123456789ab").unwrap();
    assert_eq!(ncs.variant(), IdVariant::Ncs);
    let microsoft = RecordId::parse("0a6f2b3c-1d2e-11ef-c000-0123456789ab").unwrap();
    assert_eq!(microsoft.variant(), IdVariant::Microsoft);
    let future = RecordId::parse("0a6f2b3c-1d2e-11ef-e000-0123456789ab").unwrap();
    assert_eq!(future.variant(), IdVariant::Future);
}
