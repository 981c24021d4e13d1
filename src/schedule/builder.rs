use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::parser::Domain;
use super::capacity::CapacityTable;
use super::model::{Model, Sense};
use super::tiers::{RandomFillPolicy, ZoneTiers, UNITS_PER_ZONE};
use super::types::{Period, SlotKey};

/// Knobs shared by every cohort solve of a run
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    pub time_limit: Duration,
    pub unranked_penalty: u32,
    pub random_fill: RandomFillPolicy,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            time_limit: Duration::from_secs(60),
            unranked_penalty: 99,
            random_fill: RandomFillPolicy::default(),
        }
    }
}

/// What a model variable stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarKey {
    pub participant: String,
    pub slot: SlotKey,
}

/// Slots each participant was forced into. Their seats are already taken.
pub type PinnedSlots = BTreeMap<String, BTreeSet<SlotKey>>;

/// A built model plus the meaning of each variable index
#[derive(Debug, Clone, PartialEq)]
pub struct CohortModel {
    pub model: Model,
    pub vars: Vec<VarKey>,
}

/// Turns a cohort and the residual capacity into a 0/1 model
pub struct ModelBuilder<'a> {
    domain: &'a Domain,
    options: &'a SolveOptions,
    pinned: Option<&'a PinnedSlots>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(domain: &'a Domain, options: &'a SolveOptions) -> Self {
        ModelBuilder {
            domain,
            options,
            pinned: None,
        }
    }

    /// Fixes forced placements to 1 for the members they belong to
    pub fn with_pinned(mut self, pinned: &'a PinnedSlots) -> Self {
        self.pinned = Some(pinned);
        self
    }

    pub fn is_pinned(&self, participant: &str, slot: &SlotKey) -> bool {
        self.pinned
            .and_then(|pinned| pinned.get(participant))
            .is_some_and(|slots| slots.contains(slot))
    }

    /// Builds one variable per (member, slot) in `capacity` and the full constraint set.
    /// Exhausted slots stay in the model with a zero upper bound.
    ///
    /// A pinned variable is fixed to 1, costs nothing and stays out of `Cap`. It
    /// still counts toward the zone quota and the period rules, but never against
    /// the random-fill allowance.
    pub fn build(&self, members: &[String], capacity: &CapacityTable) -> CohortModel {
        let slots: Vec<(&SlotKey, u32)> = capacity.iter().collect();
        let slot_count = slots.len();
        let var = |member: usize, slot: usize| member * slot_count + slot;
        let penalty = f64::from(self.domain.unranked_penalty(self.options.unranked_penalty));

        let mut model = Model::default();
        let mut vars = Vec::with_capacity(members.len() * slot_count);
        let mut pinned = Vec::new();
        for member in members {
            for (slot, _) in &slots {
                let cost = if self.is_pinned(member, slot) {
                    pinned.push(vars.len());
                    0.0
                } else {
                    self.domain
                        .costs
                        .rank(member, &slot.activity)
                        .map_or(penalty, f64::from)
                };
                model.add_variable(cost);
                vars.push(VarKey {
                    participant: member.clone(),
                    slot: (*slot).clone(),
                });
            }
        }

        let mut by_zone: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut by_activity: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, (slot, _)) in slots.iter().enumerate() {
            if let Some(zone) = self.domain.zones.zone_of(&slot.activity) {
                by_zone.entry(zone).or_default().push(index);
            }
            by_activity.entry(slot.activity.as_str()).or_default().push(index);
        }

        for &v in &pinned {
            model.add_constraint(
                format!("Forced[{}|{}]", vars[v].participant, vars[v].slot),
                [(v, 1.0)],
                Sense::Eq,
                1.0,
            );
        }

        // Zone quota, second-choice backstop and random-fill cap
        for (m, member) in members.iter().enumerate() {
            for (zone, zone_slots) in &by_zone {
                let tiers = ZoneTiers::classify(
                    &self.domain.costs,
                    member,
                    zone_slots.iter().map(|&s| (var(m, s), slots[s].0)),
                );
                let allowance = tiers.random_allowance(self.options.random_fill);
                let (forced_other, random): (Vec<(usize, u32)>, Vec<(usize, u32)>) =
                    tiers.other.iter().copied().partition(|(v, _)| pinned.contains(v));
                let forced_units: u32 = forced_other.iter().map(|&(_, u)| u).sum();
                let units = |entries: &[(usize, u32)]| {
                    entries
                        .iter()
                        .map(|&(v, u)| (v, f64::from(u)))
                        .collect::<Vec<_>>()
                };

                model.add_constraint(
                    format!("TwoPerZone[{}|{}]", member, zone),
                    tiers.all().map(|&(v, u)| (v, f64::from(u))),
                    Sense::Eq,
                    f64::from(UNITS_PER_ZONE),
                );
                model.add_constraint(
                    format!("UseSeconds[{}|{}]", member, zone),
                    units(&tiers.first).into_iter().chain(units(&tiers.second)),
                    Sense::Ge,
                    f64::from(UNITS_PER_ZONE.saturating_sub(allowance + forced_units)),
                );
                model.add_constraint(
                    format!("RandLimit[{}|{}]", member, zone),
                    units(&random),
                    Sense::Le,
                    f64::from(allowance),
                );
            }
        }

        for (s, (slot, remaining)) in slots.iter().enumerate() {
            model.add_constraint(
                format!("Cap[{}]", slot),
                (0..members.len())
                    .map(|m| var(m, s))
                    .filter(|v| !pinned.contains(v))
                    .map(|v| (v, 1.0)),
                Sense::Le,
                f64::from(*remaining),
            );
        }

        for (m, member) in members.iter().enumerate() {
            for (activity, activity_slots) in &by_activity {
                model.add_constraint(
                    format!("NoRepeat[{}|{}]", member, activity),
                    activity_slots.iter().map(|&s| (var(m, s), 1.0)),
                    Sense::Le,
                    1.0,
                );
            }

            for day in &self.domain.days {
                for half in [Period::Morning, Period::Afternoon] {
                    model.add_constraint(
                        format!("OnePerSlot[{}|{}|{}]", member, day, half.session()),
                        slots
                            .iter()
                            .enumerate()
                            .filter(|(_, (slot, _))| &slot.day == day && slot.period.covers(half))
                            .map(|(s, _)| (var(m, s), 1.0)),
                        Sense::Eq,
                        1.0,
                    );
                }
            }
        }

        CohortModel { model, vars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{read_preferences, read_schedule, Domain};

    const SCHEDULE_CSV: &str = "\
Day,Workshop Title,Session,Full_Day_Session,Capacity,Zone
Tuesday,Vissen,1,0,1,Water
Tuesday,Zwemmen,2,0,3,Water
Tuesday,Kano,0,1,2,Water
";

    const PREFS_CSV: &str = "\
Student,Zone,Workshop,Rank,Date
anna,Water,Vissen,1,20-06-2025 10:00:00
bram,Water,Kano,1,21-06-2025 10:00:00
bram,Water,Zwemmen,2,21-06-2025 10:00:00
";

    fn domain() -> Domain {
        Domain::assemble(
            read_schedule(SCHEDULE_CSV.as_bytes()).unwrap(),
            read_preferences(PREFS_CSV.as_bytes()).unwrap(),
        )
        .unwrap()
    }

    fn members() -> Vec<String> {
        vec!["anna".to_string(), "bram".to_string()]
    }

    #[test]
    fn test_one_variable_per_member_and_slot() {
        let domain = domain();
        let options = SolveOptions::default();
        let built = ModelBuilder::new(&domain, &options).build(&members(), &domain.capacity);
        assert_eq!(built.model.variable_count(), 6);
        assert_eq!(built.vars[0].participant, "anna");
        assert_eq!(built.vars[3].participant, "bram");
    }

    #[test]
    fn test_unranked_pairs_get_the_penalty() {
        let domain = domain();
        let options = SolveOptions::default();
        let built = ModelBuilder::new(&domain, &options).build(&members(), &domain.capacity);
        for (key, cost) in built.vars.iter().zip(&built.model.costs) {
            let expected = match (key.participant.as_str(), key.slot.activity.as_str()) {
                ("anna", "Vissen") | ("bram", "Kano") => 1.0,
                ("bram", "Zwemmen") => 2.0,
                _ => 99.0,
            };
            assert_eq!(*cost, expected, "cost of {:?}", key);
        }
    }

    #[test]
    fn test_zone_constraints_follow_tiers() {
        let domain = domain();
        let options = SolveOptions::default();
        let model = ModelBuilder::new(&domain, &options)
            .build(&members(), &domain.capacity)
            .model;

        let quota = model.constraint("TwoPerZone[bram|Water]").unwrap();
        assert_eq!(quota.sense, Sense::Eq);
        assert_eq!(quota.rhs, 2.0);
        // the full-day Kano slot counts double
        let full_day_units: Vec<f64> = quota
            .terms
            .iter()
            .filter(|(v, _)| v % 3 == 0)
            .map(|(_, c)| *c)
            .collect();
        assert_eq!(full_day_units, vec![2.0]);

        // anna names a single title, so one random unit is allowed
        assert_eq!(model.constraint("RandLimit[anna|Water]").unwrap().rhs, 1.0);
        assert_eq!(model.constraint("UseSeconds[anna|Water]").unwrap().rhs, 1.0);
        // bram names two, so none
        assert_eq!(model.constraint("RandLimit[bram|Water]").unwrap().rhs, 0.0);
        assert_eq!(model.constraint("UseSeconds[bram|Water]").unwrap().rhs, 2.0);
    }

    #[test]
    fn test_legacy_policy_is_applied_when_selected() {
        let domain = domain();
        let options = SolveOptions {
            random_fill: RandomFillPolicy::NoSecondChoices,
            ..SolveOptions::default()
        };
        let model = ModelBuilder::new(&domain, &options)
            .build(&members(), &domain.capacity)
            .model;
        assert_eq!(model.constraint("RandLimit[anna|Water]").unwrap().rhs, 1.0);
        assert_eq!(model.constraint("RandLimit[bram|Water]").unwrap().rhs, 0.0);
    }

    #[test]
    fn test_capacity_and_period_constraints() {
        let domain = domain();
        let options = SolveOptions::default();
        let mut capacity = domain.capacity.clone();
        let vissen = SlotKey::new("Vissen", "Tuesday", Period::Morning);
        capacity.consume(&vissen, 1).unwrap();

        let model = ModelBuilder::new(&domain, &options)
            .build(&members(), &capacity)
            .model;

        let cap = model.constraint(&format!("Cap[{}]", vissen)).unwrap();
        assert_eq!(cap.rhs, 0.0);
        assert_eq!(cap.terms.len(), 2);

        // morning is covered by Vissen or the full-day Kano
        let morning = model.constraint("OnePerSlot[anna|Tuesday|1]").unwrap();
        assert_eq!(morning.terms.len(), 2);
        assert_eq!(morning.sense, Sense::Eq);

        let repeat = model.constraint("NoRepeat[bram|Kano]").unwrap();
        assert_eq!(repeat.rhs, 1.0);
    }

    #[test]
    fn test_pinned_slot_is_fixed_and_leaves_cap_and_random_fill() {
        let domain = domain();
        let options = SolveOptions::default();
        let zwemmen = SlotKey::new("Zwemmen", "Tuesday", Period::Afternoon);
        let mut pinned = PinnedSlots::new();
        pinned.entry("anna".to_string()).or_default().insert(zwemmen.clone());

        let builder = ModelBuilder::new(&domain, &options).with_pinned(&pinned);
        assert!(builder.is_pinned("anna", &zwemmen));
        assert!(!builder.is_pinned("bram", &zwemmen));

        let built = builder.build(&members(), &domain.capacity);
        let v = built
            .vars
            .iter()
            .position(|k| k.participant == "anna" && k.slot == zwemmen)
            .unwrap();
        assert_eq!(built.model.costs[v], 0.0);

        let fixed = built
            .model
            .constraint(&format!("Forced[anna|{}]", zwemmen))
            .unwrap();
        assert_eq!(fixed.sense, Sense::Eq);
        assert_eq!(fixed.terms, vec![(v, 1.0)]);

        let cap = built.model.constraint(&format!("Cap[{}]", zwemmen)).unwrap();
        assert_eq!(cap.terms.len(), 1);
        assert!(cap.terms.iter().all(|(t, _)| *t != v));

        // the forced unranked afternoon does not use up anna's random unit
        let rand = built.model.constraint("RandLimit[anna|Water]").unwrap();
        assert!(rand.terms.iter().all(|(t, _)| *t != v));
        assert_eq!(rand.rhs, 1.0);
        assert_eq!(built.model.constraint("UseSeconds[anna|Water]").unwrap().rhs, 0.0);
        assert!(built
            .model
            .constraint("TwoPerZone[anna|Water]")
            .unwrap()
            .terms
            .iter()
            .any(|(t, _)| *t == v));
    }

    #[test]
    fn test_pins_for_absent_participants_are_ignored() {
        let domain = domain();
        let options = SolveOptions::default();
        let mut pinned = PinnedSlots::new();
        pinned
            .entry("kees".to_string())
            .or_default()
            .insert(SlotKey::new("Vissen", "Tuesday", Period::Morning));

        let plain = ModelBuilder::new(&domain, &options).build(&members(), &domain.capacity);
        let with_pins = ModelBuilder::new(&domain, &options)
            .with_pinned(&pinned)
            .build(&members(), &domain.capacity);
        assert_eq!(plain, with_pins);
    }

    #[test]
    fn test_rebuilding_yields_identical_model() {
        let domain = domain();
        let options = SolveOptions::default();
        let builder = ModelBuilder::new(&domain, &options);
        assert_eq!(
            builder.build(&members(), &domain.capacity),
            builder.build(&members(), &domain.capacity)
        );
    }
}
