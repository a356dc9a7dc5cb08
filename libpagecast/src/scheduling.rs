//! Daily posting slots and interval parsing
//!
//! Each destination has a list of `HH:MM` slots. The publisher asks for the
//! next slot on every call; by default the answer is only logged. When a slot
//! window is configured, a publish is allowed only while `now` sits inside
//! `[slot, slot + window)` for one of the destination's slots.

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::types::Destination;

/// A time of day with minute precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    /// Truncate a wall-clock time to the minute, the precision slots are compared at
    pub fn from_time(time: NaiveTime) -> Self {
        SlotTime(
            NaiveTime::from_hms_opt(time.hour(), time.minute(), 0)
                .unwrap_or(NaiveTime::MIN),
        )
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for SlotTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (hour, minute) = trimmed
            .split_once(':')
            .ok_or_else(|| format!("Invalid slot '{}': expected HH:MM", s))?;

        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(format!("Invalid slot '{}': expected HH:MM", s));
        }

        let hour: u32 = hour
            .parse()
            .map_err(|_| format!("Invalid slot '{}': hour is not a number", s))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| format!("Invalid slot '{}': minute is not a number", s))?;

        SlotTime::new(hour, minute).ok_or_else(|| format!("Invalid slot '{}': out of range", s))
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Ascending, de-duplicated list of slots for one destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotTable {
    slots: Vec<SlotTime>,
}

impl SlotTable {
    pub fn new(mut slots: Vec<SlotTime>) -> Self {
        slots.sort();
        slots.dedup();
        Self { slots }
    }

    pub fn slots(&self) -> &[SlotTime] {
        &self.slots
    }

    /// First slot strictly after `now`, wrapping to the first slot of the day
    ///
    /// Returns `None` only when the table is empty.
    pub fn next_slot(&self, now: NaiveTime) -> Option<SlotTime> {
        let now = SlotTime::from_time(now);
        self.slots
            .iter()
            .find(|slot| **slot > now)
            .or_else(|| self.slots.first())
            .copied()
    }

    /// Slot whose window currently contains `now`, if any
    ///
    /// Windows may run past midnight.
    pub fn open_slot(&self, now: NaiveTime, window: Duration) -> Option<SlotTime> {
        let now = SlotTime::from_time(now).time();
        self.slots.iter().copied().find(|slot| {
            let mut elapsed = now - slot.time();
            if elapsed < Duration::zero() {
                elapsed += Duration::days(1);
            }
            elapsed < window
        })
    }
}

/// Result of consulting the schedule before a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDecision {
    /// Publish now; carries the advisory next slot for logging
    Proceed { next: Option<SlotTime> },
    /// Gate is on and no window is open
    Wait { next: SlotTime },
}

/// Slot tables for both destinations plus the optional gate
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub feed: SlotTable,
    pub story: SlotTable,
    /// When set, publishing is confined to `[slot, slot + window)`
    pub window: Option<Duration>,
}

impl Schedule {
    pub fn table(&self, destination: Destination) -> &SlotTable {
        match destination {
            Destination::Feed => &self.feed,
            Destination::Story => &self.story,
        }
    }

    pub fn decide(&self, destination: Destination, now: NaiveTime) -> SlotDecision {
        let table = self.table(destination);
        let next = table.next_slot(now);

        match (self.window, next) {
            (Some(window), Some(next)) if table.open_slot(now, window).is_none() => {
                SlotDecision::Wait { next }
            }
            _ => SlotDecision::Proceed { next },
        }
    }
}

/// Parse a human-readable interval such as "60s", "5m" or "1h"
pub fn parse_interval(input: &str) -> Result<std::time::Duration, String> {
    let duration = humantime::parse_duration(input.trim())
        .map_err(|e| format!("Could not parse interval '{}': {}", input, e))?;

    if duration.is_zero() {
        return Err(format!("Interval '{}' must be greater than zero", input));
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn table(slots: &[&str]) -> SlotTable {
        SlotTable::new(slots.iter().map(|s| s.parse().unwrap()).collect())
    }

    #[test]
    fn test_parse_slot() {
        let slot: SlotTime = "09:30".parse().unwrap();
        assert_eq!(slot, SlotTime::new(9, 30).unwrap());
        assert_eq!(slot.to_string(), "09:30");

        let short: SlotTime = "9:05".parse().unwrap();
        assert_eq!(short.to_string(), "09:05");
    }

    #[test]
    fn test_parse_slot_invalid() {
        assert!("".parse::<SlotTime>().is_err());
        assert!("0930".parse::<SlotTime>().is_err());
        assert!("24:00".parse::<SlotTime>().is_err());
        assert!("12:60".parse::<SlotTime>().is_err());
        assert!("12:5".parse::<SlotTime>().is_err());
        assert!("ab:cd".parse::<SlotTime>().is_err());
    }

    #[test]
    fn test_next_slot_later_today() {
        let slots = table(&["09:00", "17:00"]);
        assert_eq!(slots.next_slot(at(10, 0)).unwrap().to_string(), "17:00");
    }

    #[test]
    fn test_next_slot_wraps_to_first() {
        let slots = table(&["09:00", "17:00"]);
        assert_eq!(slots.next_slot(at(18, 0)).unwrap().to_string(), "09:00");
    }

    #[test]
    fn test_next_slot_is_strictly_after_now() {
        let slots = table(&["09:00", "17:00"]);
        let now = NaiveTime::from_hms_opt(9, 0, 45).unwrap();
        assert_eq!(slots.next_slot(now).unwrap().to_string(), "17:00");
    }

    #[test]
    fn test_next_slot_sorts_configured_order() {
        let slots = table(&["17:00", "09:00", "17:00"]);
        assert_eq!(slots.slots().len(), 2);
        assert_eq!(slots.next_slot(at(8, 0)).unwrap().to_string(), "09:00");
    }

    #[test]
    fn test_next_slot_empty_table() {
        assert!(SlotTable::default().next_slot(at(8, 0)).is_none());
    }

    #[test]
    fn test_open_slot_window() {
        let slots = table(&["09:00"]);
        let window = Duration::minutes(30);
        assert!(slots.open_slot(at(9, 0), window).is_some());
        assert!(slots.open_slot(at(9, 29), window).is_some());
        assert!(slots.open_slot(at(9, 30), window).is_none());
        assert!(slots.open_slot(at(8, 59), window).is_none());
    }

    #[test]
    fn test_open_slot_window_past_midnight() {
        let slots = table(&["23:50"]);
        assert!(slots.open_slot(at(0, 5), Duration::minutes(20)).is_some());
        assert!(slots.open_slot(at(0, 15), Duration::minutes(20)).is_none());
    }

    #[test]
    fn test_decide_advisory_by_default() {
        let schedule = Schedule {
            feed: table(&["09:00"]),
            ..Default::default()
        };
        assert_eq!(
            schedule.decide(Destination::Feed, at(12, 0)),
            SlotDecision::Proceed {
                next: "09:00".parse().ok()
            }
        );
    }

    #[test]
    fn test_decide_gate_waits_outside_window() {
        let schedule = Schedule {
            story: table(&["09:00", "17:00"]),
            window: Some(Duration::minutes(15)),
            ..Default::default()
        };
        assert_eq!(
            schedule.decide(Destination::Story, at(12, 0)),
            SlotDecision::Wait {
                next: "17:00".parse().unwrap()
            }
        );
        assert!(matches!(
            schedule.decide(Destination::Story, at(17, 10)),
            SlotDecision::Proceed { .. }
        ));
    }

    #[test]
    fn test_decide_gate_without_slots_proceeds() {
        let schedule = Schedule {
            window: Some(Duration::minutes(15)),
            ..Default::default()
        };
        assert_eq!(
            schedule.decide(Destination::Feed, at(12, 0)),
            SlotDecision::Proceed { next: None }
        );
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(
            parse_interval("60s").unwrap(),
            std::time::Duration::from_secs(60)
        );
        assert_eq!(
            parse_interval("1h").unwrap(),
            std::time::Duration::from_secs(3600)
        );
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("soon").is_err());
    }
}
