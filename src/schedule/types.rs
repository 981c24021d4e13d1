use std::fmt;
use serde::{Serialize, Deserialize};

/// Part of a day a slot occupies. Sessions are numbered 0 (full day), 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    FullDay,
    Morning,
    Afternoon,
}

impl Period {
    /// Maps a raw session number onto a period
    pub fn from_session(session: i64) -> Option<Self> {
        match session {
            0 => Some(Period::FullDay),
            1 => Some(Period::Morning),
            2 => Some(Period::Afternoon),
            _ => None,
        }
    }

    pub fn session(self) -> u8 {
        match self {
            Period::FullDay => 0,
            Period::Morning => 1,
            Period::Afternoon => 2,
        }
    }

    /// Slot-units consumed by one seat in this period
    pub fn units(self) -> u32 {
        match self {
            Period::FullDay => 2,
            Period::Morning | Period::Afternoon => 1,
        }
    }

    pub fn is_full_day(self) -> bool {
        self == Period::FullDay
    }

    /// Whether a seat in this period occupies the given half-day period
    pub fn covers(self, half: Period) -> bool {
        self == half || self == Period::FullDay
    }
}

/// A seat bucket: one activity on one day in one period.
/// Ordering follows (day, activity, period) so tables iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub day: String,
    pub activity: String,
    pub period: Period,
}

impl SlotKey {
    pub fn new(activity: impl Into<String>, day: impl Into<String>, period: Period) -> Self {
        SlotKey {
            day: day.into(),
            activity: activity.into(),
            period,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / session {}", self.activity, self.day, self.period.session())
    }
}

/// One final placement of a participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub participant: String,
    pub zone: String,
    pub day: String,
    pub period: Period,
    pub activity: String,
}

impl Assignment {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.activity.clone(), self.day.clone(), self.period)
    }
}

/// A placement decided up front, bypassing the optimisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedAssignment {
    pub participant: String,
    pub slot: SlotKey,
}
