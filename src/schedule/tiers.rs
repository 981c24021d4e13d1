use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::parser::CostMap;
use super::types::SlotKey;

/// Slot-units every participant receives per zone
pub const UNITS_PER_ZONE: u32 = 2;

/// Preference tier of a candidate activity for one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    First,
    Second,
    Other,
}

impl Tier {
    pub fn of_rank(rank: Option<u32>) -> Self {
        match rank {
            Some(1) => Tier::First,
            Some(2) => Tier::Second,
            _ => Tier::Other,
        }
    }
}

/// How many non-preferred units a participant may receive in a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomFillPolicy {
    /// `2 - |distinct rank 1/2 titles|`, never below zero
    #[default]
    PreferenceShortfall,
    /// One unit, and only when no distinct second choice was given
    NoSecondChoices,
}

/// Candidate variables of one participant in one zone, split by tier.
/// Each entry is (variable index, slot-units).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneTiers<'a> {
    pub first: Vec<(usize, u32)>,
    pub second: Vec<(usize, u32)>,
    pub other: Vec<(usize, u32)>,
    pub first_titles: BTreeSet<&'a str>,
    pub second_titles: BTreeSet<&'a str>,
}

impl<'a> ZoneTiers<'a> {
    /// Splits a participant's candidate slots in one zone into tiers.
    /// `candidates` yields (variable index, slot) for slots in that zone only.
    pub fn classify<I>(costs: &CostMap, participant: &str, candidates: I) -> Self
    where
        I: IntoIterator<Item = (usize, &'a SlotKey)>,
    {
        let mut tiers = ZoneTiers::default();
        for (var, slot) in candidates {
            let units = slot.period.units();
            let title = slot.activity.as_str();
            match Tier::of_rank(costs.rank(participant, title)) {
                Tier::First => {
                    tiers.first_titles.insert(title);
                    tiers.first.push((var, units));
                }
                Tier::Second if !tiers.first_titles.contains(title) => {
                    tiers.second_titles.insert(title);
                    tiers.second.push((var, units));
                }
                Tier::Second | Tier::Other => tiers.other.push((var, units)),
            }
        }
        tiers
    }

    /// Distinct rank 1 or 2 titles offered in the zone
    pub fn preferred_titles(&self) -> usize {
        self.first_titles.union(&self.second_titles).count()
    }

    /// Units of tier "other" the policy permits
    pub fn random_allowance(&self, policy: RandomFillPolicy) -> u32 {
        match policy {
            RandomFillPolicy::PreferenceShortfall => {
                UNITS_PER_ZONE.saturating_sub(self.preferred_titles() as u32)
            }
            RandomFillPolicy::NoSecondChoices => u32::from(self.second_titles.is_empty()),
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &(usize, u32)> {
        self.first.iter().chain(&self.second).chain(&self.other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::Period;

    fn costs() -> CostMap {
        let mut costs = CostMap::default();
        costs.insert("anna", "Vissen", 1);
        costs.insert("anna", "Zwemmen", 2);
        costs.insert("anna", "Kaas", 4);
        costs
    }

    fn slots() -> Vec<SlotKey> {
        vec![
            SlotKey::new("Vissen", "Tuesday", Period::Morning),
            SlotKey::new("Vissen", "Wednesday", Period::Morning),
            SlotKey::new("Zwemmen", "Tuesday", Period::Afternoon),
            SlotKey::new("Kaas", "Thursday", Period::FullDay),
            SlotKey::new("Papier", "Tuesday", Period::Afternoon),
        ]
    }

    #[test]
    fn test_tier_of_rank() {
        assert_eq!(Tier::of_rank(Some(1)), Tier::First);
        assert_eq!(Tier::of_rank(Some(2)), Tier::Second);
        assert_eq!(Tier::of_rank(Some(3)), Tier::Other);
        assert_eq!(Tier::of_rank(None), Tier::Other);
    }

    #[test]
    fn test_classify_counts_full_days_as_two_units() {
        let costs = costs();
        let slots = slots();
        let tiers = ZoneTiers::classify(&costs, "anna", slots.iter().enumerate());
        assert_eq!(tiers.first, vec![(0, 1), (1, 1)]);
        assert_eq!(tiers.second, vec![(2, 1)]);
        assert_eq!(tiers.other, vec![(3, 2), (4, 1)]);
        assert_eq!(tiers.preferred_titles(), 2);
        assert_eq!(tiers.all().count(), 5);
    }

    #[test]
    fn test_shortfall_policy_allows_random_for_missing_titles() {
        let mut costs = CostMap::default();
        costs.insert("bram", "Vissen", 1);
        let slots = slots();
        let tiers = ZoneTiers::classify(&costs, "bram", slots.iter().enumerate());
        assert_eq!(tiers.random_allowance(RandomFillPolicy::PreferenceShortfall), 1);
        assert_eq!(tiers.random_allowance(RandomFillPolicy::NoSecondChoices), 1);

        let tiers = ZoneTiers::classify(&costs, "nobody", slots.iter().enumerate());
        assert_eq!(tiers.random_allowance(RandomFillPolicy::PreferenceShortfall), 2);
    }

    #[test]
    fn test_policies_diverge_once_a_second_choice_exists() {
        let mut costs = CostMap::default();
        costs.insert("carla", "Zwemmen", 2);
        let slots = slots();
        let tiers = ZoneTiers::classify(&costs, "carla", slots.iter().enumerate());
        assert_eq!(tiers.random_allowance(RandomFillPolicy::PreferenceShortfall), 1);
        assert_eq!(tiers.random_allowance(RandomFillPolicy::NoSecondChoices), 0);
    }

    #[test]
    fn test_policy_names_in_config() {
        let policy: RandomFillPolicy = serde_json::from_str("\"no_second_choices\"").unwrap();
        assert_eq!(policy, RandomFillPolicy::NoSecondChoices);
    }
}
