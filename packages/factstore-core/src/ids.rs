use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::Clock;

/// 100-nanosecond intervals between 1582-10-15 and the Unix epoch.
const GREGORIAN_OFFSET: u64 = 0x01B2_1DD2_1381_4000;
const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: u32 = 100;
const TIMESTAMP_MASK: u64 = (1 << 60) - 1;
const CLOCK_SEQUENCE_MASK: u16 = 0x3FFF;
const GROUP_LENGTHS: [usize; 5] = [8, 4, 4, 4, 12];
const CANONICAL_LENGTH: usize = 36;

/// Trailing 48 bits of a time-based identifier.
pub type PseudoNode = [u8; 6];

/// Which generation scheme to use for a fresh identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum IdKind {
    /// Version 1: embeds a timestamp, clock sequence and pseudo-node.
    TimeBased,
    /// Version 4: 122 random bits.
    Random,
}

/// Identifier family encoded in the variant bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum IdVariant {
    Ncs,
    Rfc4122,
    Microsoft,
    Future,
}

/// Count of 100-nanosecond intervals since 1582-10-15 (60 significant bits).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_ticks(ticks: u64) -> Self {
        Self(ticks & TIMESTAMP_MASK)
    }

    pub fn ticks(self) -> u64 {
        self.0
    }

    /// Converts a wall-clock instant, truncating to 100 ns and clamping to the
    /// representable range.
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        let ticks = instant.timestamp() as i128 * TICKS_PER_SECOND as i128
            + (instant.timestamp_subsec_nanos() / NANOS_PER_TICK) as i128
            + GREGORIAN_OFFSET as i128;
        Self(ticks.clamp(0, TIMESTAMP_MASK as i128) as u64)
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        let unix_ticks = self.0 as i64 - GREGORIAN_OFFSET as i64;
        let secs = unix_ticks.div_euclid(TICKS_PER_SECOND);
        let nanos = unix_ticks.rem_euclid(TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;
        DateTime::<Utc>::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// 128-bit identifier shared by every record in the store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Builds a version 1 identifier from its parts.
    pub fn time_based(timestamp: Timestamp, clock_sequence: u16, node: PseudoNode) -> Self {
        let ticks = timestamp.ticks();
        let time_low = (ticks & 0xFFFF_FFFF) as u32;
        let time_mid = ((ticks >> 32) & 0xFFFF) as u16;
        let time_hi_and_version = ((ticks >> 48) & 0x0FFF) as u16 | 0x1000;
        let clock_sequence = clock_sequence & CLOCK_SEQUENCE_MASK;
        let tail = [
            (clock_sequence >> 8) as u8 | 0x80,
            (clock_sequence & 0xFF) as u8,
            node[0],
            node[1],
            node[2],
            node[3],
            node[4],
            node[5],
        ];
        Self(Uuid::from_fields(time_low, time_mid, time_hi_and_version, &tail))
    }

    /// Parses the canonical 8-4-4-4-12 hex form and nothing else.
    pub fn parse(text: &str) -> Result<Self> {
        if text.len() != CANONICAL_LENGTH {
            return Err(Error::InvalidIdentifier(format!(
                "`{text}` has length {}, expected {CANONICAL_LENGTH}",
                text.len()
            )));
        }
        let groups: Vec<&str> = text.split('-').collect();
        if groups.len() != GROUP_LENGTHS.len() {
            return Err(Error::InvalidIdentifier(format!(
                "`{text}` has {} groups, expected {}",
                groups.len(),
                GROUP_LENGTHS.len()
            )));
        }
        for (group, expected) in groups.iter().zip(GROUP_LENGTHS) {
            if group.len() != expected {
                return Err(Error::InvalidIdentifier(format!(
                    "`{text}` has a group of {} digits where {expected} are required",
                    group.len()
                )));
            }
            if !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::InvalidIdentifier(format!(
                    "`{text}` contains non-hex digits"
                )));
            }
        }
        Uuid::parse_str(text)
            .map(Self)
            .map_err(|err| Error::InvalidIdentifier(format!("`{text}`: {err}")))
    }

    /// Version nibble (1 = time-based, 4 = random).
    pub fn version(&self) -> u8 {
        self.0.get_version_num() as u8
    }

    pub fn variant(&self) -> IdVariant {
        let byte = self.0.as_bytes()[8];
        if byte & 0x80 == 0 {
            IdVariant::Ncs
        } else if byte & 0x40 == 0 {
            IdVariant::Rfc4122
        } else if byte & 0x20 == 0 {
            IdVariant::Microsoft
        } else {
            IdVariant::Future
        }
    }

    /// Embedded creation time; `None` unless the id is time-based.
    pub fn timestamp(&self) -> Option<Timestamp> {
        if self.version() != 1 {
            return None;
        }
        let (time_low, time_mid, time_hi_and_version, _) = self.0.as_fields();
        let ticks = ((time_hi_and_version & 0x0FFF) as u64) << 48
            | (time_mid as u64) << 32
            | time_low as u64;
        Some(Timestamp(ticks))
    }

    pub fn clock_sequence(&self) -> u16 {
        let bytes = self.0.as_bytes();
        (((bytes[8] as u16) << 8) | bytes[9] as u16) & CLOCK_SEQUENCE_MASK
    }

    pub fn pseudo_node(&self) -> PseudoNode {
        let mut node = [0u8; 6];
        node.copy_from_slice(&self.0.as_bytes()[10..]);
        node
    }

    pub(crate) fn axiomatic(ordinal: u64) -> Self {
        Self::time_based(Timestamp::from_ticks(ordinal), 0, [0; 6])
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Identifier source owned by the store.
///
/// Time-based ids are strictly increasing per generator: when the clock
/// stalls or steps backwards the previous tick is bumped by one.
pub struct IdGenerator<C: Clock> {
    clock: C,
    rng: StdRng,
    clock_sequence: u16,
    node: PseudoNode,
    last_tick: u64,
}

impl<C: Clock> IdGenerator<C> {
    pub fn new(clock: C, mut rng: StdRng) -> Self {
        let clock_sequence = rng.gen::<u16>() & CLOCK_SEQUENCE_MASK;
        let node = random_node(&mut rng);
        Self {
            clock,
            rng,
            clock_sequence,
            node,
            last_tick: 0,
        }
    }

    /// Allocate an identifier. `node` overrides the per-process pseudo-node
    /// for time-based ids.
    pub fn next_id(&mut self, kind: IdKind, node: Option<PseudoNode>) -> RecordId {
        match kind {
            IdKind::TimeBased => {
                let now = Timestamp::from_datetime(self.clock.now()).ticks();
                let tick = now.max(self.last_tick.saturating_add(1));
                self.last_tick = tick;
                RecordId::time_based(
                    Timestamp::from_ticks(tick),
                    self.clock_sequence,
                    node.unwrap_or(self.node),
                )
            }
            IdKind::Random => {
                let bytes: [u8; 16] = self.rng.gen();
                RecordId(uuid::Builder::from_random_bytes(bytes).into_uuid())
            }
        }
    }

    /// A fresh random pseudo-node, e.g. for a new login identity.
    pub fn random_node(&mut self) -> PseudoNode {
        random_node(&mut self.rng)
    }

    pub fn node(&self) -> PseudoNode {
        self.node
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

fn random_node(rng: &mut StdRng) -> PseudoNode {
    let mut node: PseudoNode = rng.gen();
    // multicast bit marks the node as not derived from hardware
    node[0] |= 0x01;
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ManualClock;
    use chrono::TimeZone;
    use rand::SeedableRng;

    fn frozen_generator() -> IdGenerator<ManualClock> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        IdGenerator::new(clock, StdRng::seed_from_u64(7))
    }

    #[test]
    fn time_based_ids_render_canonically_and_parse_back() {
        let mut ids = frozen_generator();
        let id = ids.next_id(IdKind::TimeBased, None);
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(&text[14..15], "1");
        assert_eq!(RecordId::parse(&text).unwrap(), id);
        assert_eq!(id.version(), 1);
        assert_eq!(id.variant(), IdVariant::Rfc4122);
    }

    #[test]
    fn random_ids_are_version_four() {
        let mut ids = frozen_generator();
        let id = ids.next_id(IdKind::Random, None);
        assert_eq!(id.version(), 4);
        assert_eq!(id.variant(), IdVariant::Rfc4122);
        assert_eq!(id.timestamp(), None);
    }

    #[test]
    fn timestamp_decodes_the_clock_reading() {
        let mut ids = frozen_generator();
        let id = ids.next_id(IdKind::TimeBased, None);
        let decoded = id.timestamp().unwrap().to_datetime();
        assert_eq!(decoded, ids.clock().now());
    }

    #[test]
    fn frozen_clock_still_yields_increasing_ticks() {
        let mut ids = frozen_generator();
        let a = ids.next_id(IdKind::TimeBased, None);
        let b = ids.next_id(IdKind::TimeBased, None);
        let c = ids.next_id(IdKind::TimeBased, None);
        let (ta, tb, tc) = (
            a.timestamp().unwrap(),
            b.timestamp().unwrap(),
            c.timestamp().unwrap(),
        );
        assert!(ta < tb && tb < tc);
        assert_eq!(tb.ticks(), ta.ticks() + 1);
    }

    #[test]
    fn clock_stepping_backwards_keeps_monotonic() {
        let mut ids = frozen_generator();
        let a = ids.next_id(IdKind::TimeBased, None);
        ids.clock().advance(chrono::Duration::seconds(-30));
        let b = ids.next_id(IdKind::TimeBased, None);
        assert!(b.timestamp().unwrap() > a.timestamp().unwrap());
    }

    #[test]
    fn override_node_lands_in_trailing_group() {
        let mut ids = frozen_generator();
        let node = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01];
        let id = ids.next_id(IdKind::TimeBased, Some(node));
        assert_eq!(id.pseudo_node(), node);
        assert!(id.to_string().ends_with("deadbeef0001"));
        assert_ne!(ids.node(), node);
        assert_eq!(ids.node()[0] & 0x01, 0x01);
    }

    #[test]
    fn parse_rejects_malformed_text() {
        let bad = [
            "",
            "0123456789abcdef0123456789abcdef",
            "{01234567-89ab-cdef-0123-456789abcdef}",
            "01234567-89ab-cdef-0123-456789abcdeg",
            "0123456-789ab-cdef-0123-456789abcdef",
            "01234567-89ab-cdef-0123-456789abcdef0",
            "01234567-89ab-cdef-01234-56789abcdef",
            "01234567_89ab_cdef_0123_456789abcdef",
        ];
        for text in bad {
            assert!(
                matches!(RecordId::parse(text), Err(Error::InvalidIdentifier(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn parse_accepts_upper_case_hex() {
        let id = RecordId::parse("01234567-89AB-1DEF-8123-456789ABCDEF").unwrap();
        assert_eq!(id.to_string(), "01234567-89ab-1def-8123-456789abcdef");
    }

    #[test]
    fn datetime_round_trip_keeps_100ns_precision() {
        let instant = Utc.timestamp_opt(1_700_000_000, 123_456_700).unwrap();
        let ts = Timestamp::from_datetime(instant);
        assert_eq!(ts.to_datetime(), instant);
    }

    #[test]
    fn axiomatic_ids_have_zero_node() {
        let id = RecordId::axiomatic(3);
        assert_eq!(id.pseudo_node(), [0; 6]);
        assert_eq!(id.timestamp().unwrap().ticks(), 3);
        assert_eq!(id.clock_sequence(), 0);
    }
}
