use std::collections::BTreeMap;
use serde::Serialize;

use crate::error::CapacityError;
use super::types::SlotKey;

/// Residual seats per slot. Seats can only be consumed, never returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityTable {
    slots: BTreeMap<SlotKey, u32>,
}

impl CapacityTable {
    pub fn new(slots: BTreeMap<SlotKey, u32>) -> Self {
        CapacityTable { slots }
    }

    pub fn remaining(&self, slot: &SlotKey) -> Option<u32> {
        self.slots.get(slot).copied()
    }

    /// Takes `seats` from a slot, returning what is left
    pub fn consume(&mut self, slot: &SlotKey, seats: u32) -> Result<u32, CapacityError> {
        let remaining = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| CapacityError::UnknownSlot(slot.clone()))?;
        if *remaining < seats {
            return Err(CapacityError::Exhausted {
                slot: slot.clone(),
                remaining: *remaining,
                requested: seats,
            });
        }
        *remaining -= seats;
        Ok(*remaining)
    }

    pub fn contains(&self, slot: &SlotKey) -> bool {
        self.slots.contains_key(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, u32)> {
        self.slots.iter().map(|(slot, &seats)| (slot, seats))
    }

    /// True when every slot has at most as many seats as in `other`
    pub fn is_within(&self, other: &CapacityTable) -> bool {
        self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .all(|(slot, &seats)| other.remaining(slot).map_or(false, |theirs| seats <= theirs))
    }

    pub fn snapshot(&self) -> Vec<(SlotKey, u32)> {
        self.slots.iter().map(|(slot, &seats)| (slot.clone(), seats)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::Period;

    fn table() -> CapacityTable {
        let mut slots = BTreeMap::new();
        slots.insert(SlotKey::new("Vissen", "Tuesday", Period::Morning), 2);
        slots.insert(SlotKey::new("Kaas", "Thursday", Period::FullDay), 0);
        CapacityTable::new(slots)
    }

    #[test]
    fn test_consume_decrements_remaining() {
        let mut caps = table();
        let slot = SlotKey::new("Vissen", "Tuesday", Period::Morning);
        assert_eq!(caps.consume(&slot, 1), Ok(1));
        assert_eq!(caps.remaining(&slot), Some(1));
    }

    #[test]
    fn test_consume_never_goes_negative() {
        let mut caps = table();
        let slot = SlotKey::new("Kaas", "Thursday", Period::FullDay);
        let err = caps.consume(&slot, 1).unwrap_err();
        assert!(matches!(err, CapacityError::Exhausted { remaining: 0, requested: 1, .. }));
        assert_eq!(caps.remaining(&slot), Some(0));
    }

    #[test]
    fn test_consume_unknown_slot_is_rejected() {
        let mut caps = table();
        let slot = SlotKey::new("Zwemmen", "Tuesday", Period::Morning);
        assert_eq!(caps.consume(&slot, 1), Err(CapacityError::UnknownSlot(slot)));
    }

    #[test]
    fn test_is_within_tracks_consumption() {
        let before = table();
        let mut after = before.clone();
        after
            .consume(&SlotKey::new("Vissen", "Tuesday", Period::Morning), 2)
            .unwrap();
        assert!(after.is_within(&before));
        assert!(!before.is_within(&after));
    }
}
