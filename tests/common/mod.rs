//! Common test utilities

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;
use workshop_assign::parser::{read_preferences, read_schedule, Domain};
use workshop_assign::schedule::{Assignment, Period, SlotKey};

/// Build a domain from inline schedule and preference CSV
#[allow(dead_code)]
pub fn domain_from(schedule: &str, preferences: &str) -> Domain {
    Domain::assemble(
        read_schedule(schedule.as_bytes()).unwrap(),
        read_preferences(preferences.as_bytes()).unwrap(),
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn at(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}

#[allow(dead_code)]
pub fn rows_of<'a>(assignments: &'a [Assignment], participant: &str) -> Vec<&'a Assignment> {
    assignments
        .iter()
        .filter(|a| a.participant == participant)
        .collect()
}

/// Assert the placement rules for every participant, forced rows included
#[allow(dead_code)]
pub fn assert_placement_rules(domain: &Domain, assignments: &[Assignment]) {
    let mut seats: BTreeMap<SlotKey, u32> = BTreeMap::new();
    for row in assignments {
        *seats.entry(row.slot()).or_insert(0) += 1;
    }
    for (slot, taken) in &seats {
        let offered = domain.capacity.remaining(slot).unwrap();
        assert!(*taken <= offered, "{} has {} seats but {} placements", slot, offered, taken);
    }

    let mut by_participant: HashMap<&str, Vec<&Assignment>> = HashMap::new();
    for row in assignments {
        by_participant.entry(row.participant.as_str()).or_default().push(row);
    }

    for (participant, rows) in by_participant {
        for day in &domain.days {
            for half in [Period::Morning, Period::Afternoon] {
                let covering = rows
                    .iter()
                    .filter(|r| &r.day == day && r.period.covers(half))
                    .count();
                assert_eq!(covering, 1, "{} on {} session {}", participant, day, half.session());
            }
        }

        let mut activities = HashSet::new();
        for row in &rows {
            assert!(
                activities.insert(row.activity.as_str()),
                "{} repeats {}",
                participant,
                row.activity
            );
        }

        for zone in domain.scheduled_zones() {
            let units: u32 = rows
                .iter()
                .filter(|r| r.zone == zone)
                .map(|r| r.period.units())
                .sum();
            assert_eq!(units, 2, "{} has {} units in {}", participant, units, zone);
        }
    }
}
