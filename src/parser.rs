use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::DataError;
use crate::schedule::capacity::CapacityTable;
use crate::schedule::types::{ForcedAssignment, Period, SlotKey};

/// Submission timestamp format used by the preference form export
pub const SUBMISSION_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

const SCHEDULE: &str = "schedule";
const PREFERENCES: &str = "preferences";
const FORCED: &str = "forced placements";

/// Normalizes a participant identifier: whitespace collapsed, lowercased
pub fn normalize_participant(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parses an integer cell, accepting spreadsheet-style "3.0"
fn parse_int(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    let float: f64 = trimmed.parse().ok()?;
    if float.is_finite() && float.fract() == 0.0 {
        Some(float as i64)
    } else {
        None
    }
}

fn column(headers: &StringRecord, table: &'static str, name: &'static str) -> Result<usize, DataError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or(DataError::MissingColumn { table, column: name })
}

fn row_number(record: &StringRecord, index: usize) -> usize {
    record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(index + 2)
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new().trim(Trim::All).from_reader(input)
}

fn required_text(
    record: &StringRecord,
    col: usize,
    table: &'static str,
    row: usize,
    field: &'static str,
) -> Result<String, DataError> {
    let value = record.get(col).unwrap_or("").trim();
    if value.is_empty() {
        return Err(DataError::InvalidValue {
            table,
            row,
            field,
            value: String::new(),
            reason: "must not be empty",
        });
    }
    Ok(value.to_string())
}

fn required_int(
    record: &StringRecord,
    col: usize,
    table: &'static str,
    row: usize,
    field: &'static str,
) -> Result<i64, DataError> {
    let value = record.get(col).unwrap_or("");
    parse_int(value).ok_or_else(|| DataError::NotAnInteger {
        table,
        row,
        field,
        value: value.trim().to_string(),
    })
}

fn required_period(
    record: &StringRecord,
    col: usize,
    table: &'static str,
    row: usize,
) -> Result<Period, DataError> {
    let session = required_int(record, col, table, row, "Session")?;
    Period::from_session(session).ok_or_else(|| DataError::InvalidValue {
        table,
        row,
        field: "Session",
        value: session.to_string(),
        reason: "expected 0 (full day), 1 or 2",
    })
}

/// Seats per slot as read from the schedule, before any placement
#[derive(Debug, Clone, Default)]
pub struct ScheduleTable {
    pub slots: BTreeMap<SlotKey, u32>,
    /// Days in first-seen order
    pub days: Vec<String>,
    /// (activity, zone) pairs in row order, when the schedule carries zones
    pub zones: Vec<(String, String)>,
}

/// Reads schedule rows. Any malformed row aborts the load.
pub fn read_schedule<R: Read>(input: R) -> Result<ScheduleTable, DataError> {
    let mut rdr = reader(input);
    let csv_err = |source| DataError::Csv { table: SCHEDULE, source };

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let day_col = column(&headers, SCHEDULE, "Day")?;
    let title_col = column(&headers, SCHEDULE, "Workshop Title")?;
    let session_col = column(&headers, SCHEDULE, "Session")?;
    let full_col = column(&headers, SCHEDULE, "Full_Day_Session")?;
    let capacity_col = column(&headers, SCHEDULE, "Capacity")?;
    let zone_col = headers.iter().position(|h| h.trim() == "Zone");

    let mut table = ScheduleTable::default();

    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_err)?;
        let row = row_number(&record, index);

        let day = required_text(&record, day_col, SCHEDULE, row, "Day")?;
        let title = required_text(&record, title_col, SCHEDULE, row, "Workshop Title")?;
        let period = required_period(&record, session_col, SCHEDULE, row)?;

        let full_flag = required_int(&record, full_col, SCHEDULE, row, "Full_Day_Session")?;
        let full_day = match full_flag {
            0 => false,
            1 => true,
            other => {
                return Err(DataError::InvalidValue {
                    table: SCHEDULE,
                    row,
                    field: "Full_Day_Session",
                    value: other.to_string(),
                    reason: "expected 0 or 1",
                })
            }
        };
        if full_day != period.is_full_day() {
            return Err(DataError::InvalidValue {
                table: SCHEDULE,
                row,
                field: "Full_Day_Session",
                value: full_flag.to_string(),
                reason: "full-day slots must use session 0 and only they may",
            });
        }

        let capacity = required_int(&record, capacity_col, SCHEDULE, row, "Capacity")?;
        let capacity = u32::try_from(capacity).map_err(|_| DataError::InvalidValue {
            table: SCHEDULE,
            row,
            field: "Capacity",
            value: capacity.to_string(),
            reason: "must be a non-negative integer",
        })?;

        if let Some(zone) = zone_col.and_then(|c| record.get(c)).map(str::trim) {
            if !zone.is_empty() {
                table.zones.push((title.clone(), zone.to_string()));
            }
        }
        if !table.days.contains(&day) {
            table.days.push(day.clone());
        }
        let seats = table.slots.entry(SlotKey::new(title, day, period)).or_insert(0);
        *seats = seats.checked_add(capacity).ok_or_else(|| DataError::InvalidValue {
            table: SCHEDULE,
            row,
            field: "Capacity",
            value: capacity.to_string(),
            reason: "total seats for the slot overflow",
        })?;
    }

    Ok(table)
}

pub fn load_schedule<P: AsRef<Path>>(path: P) -> Result<ScheduleTable, DataError> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| DataError::Csv {
        table: SCHEDULE,
        source: csv::Error::from(e),
    })?;
    read_schedule(file)
}

/// Best (lowest) stated rank per participant and activity
#[derive(Debug, Clone, Default, Serialize)]
pub struct CostMap {
    ranks: HashMap<String, HashMap<String, u32>>,
    max_rank: u32,
}

impl CostMap {
    /// Records a rank, keeping the lowest seen for the pair
    pub fn insert(&mut self, participant: &str, activity: &str, rank: u32) {
        let best = self
            .ranks
            .entry(participant.to_string())
            .or_default()
            .entry(activity.to_string())
            .or_insert(rank);
        *best = (*best).min(rank);
        self.max_rank = self.max_rank.max(rank);
    }

    pub fn rank(&self, participant: &str, activity: &str) -> Option<u32> {
        self.ranks.get(participant)?.get(activity).copied()
    }

    /// Highest rank anyone stated, 0 when there are no preferences
    pub fn max_rank(&self) -> u32 {
        self.max_rank
    }
}

/// Result of reading the preference export
#[derive(Debug, Clone, Default)]
pub struct PreferenceTable {
    pub costs: CostMap,
    /// Earliest submission per participant
    pub submitted: HashMap<String, NaiveDateTime>,
    /// (activity, zone) pairs in row order
    pub zones: Vec<(String, String)>,
    pub skipped_rows: usize,
}

/// Reads preference rows. Rows with a bad rank, date or empty key are skipped.
pub fn read_preferences<R: Read>(input: R) -> Result<PreferenceTable, DataError> {
    let mut rdr = reader(input);
    let csv_err = |source| DataError::Csv { table: PREFERENCES, source };

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let student_col = column(&headers, PREFERENCES, "Student")?;
    let zone_col = column(&headers, PREFERENCES, "Zone")?;
    let workshop_col = column(&headers, PREFERENCES, "Workshop")?;
    let rank_col = column(&headers, PREFERENCES, "Rank")?;
    let date_col = column(&headers, PREFERENCES, "Date")?;

    let mut table = PreferenceTable::default();

    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_err)?;
        let row = row_number(&record, index);

        let student = normalize_participant(record.get(student_col).unwrap_or(""));
        let workshop = record.get(workshop_col).unwrap_or("").trim().to_string();
        if student.is_empty() || workshop.is_empty() {
            tracing::warn!(row, "Skipping preference row without student or workshop");
            table.skipped_rows += 1;
            continue;
        }

        let raw_rank = record.get(rank_col).unwrap_or("");
        let rank = match parse_int(raw_rank).and_then(|r| u32::try_from(r).ok()) {
            Some(rank) if rank >= 1 => rank,
            _ => {
                tracing::warn!(row, rank = raw_rank, student = %student, "Skipping preference row with invalid rank");
                table.skipped_rows += 1;
                continue;
            }
        };

        let raw_date = record.get(date_col).unwrap_or("").trim();
        let submitted = match NaiveDateTime::parse_from_str(raw_date, SUBMISSION_FORMAT) {
            Ok(date) => date,
            Err(_) => {
                tracing::warn!(row, date = raw_date, student = %student, "Skipping preference row with invalid date");
                table.skipped_rows += 1;
                continue;
            }
        };

        let zone = record.get(zone_col).unwrap_or("").trim();
        if !zone.is_empty() {
            table.zones.push((workshop.clone(), zone.to_string()));
        }

        table.costs.insert(&student, &workshop, rank);
        table
            .submitted
            .entry(student)
            .and_modify(|earliest| *earliest = (*earliest).min(submitted))
            .or_insert(submitted);
    }

    Ok(table)
}

pub fn load_preferences<P: AsRef<Path>>(path: P) -> Result<PreferenceTable, DataError> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| DataError::Csv {
        table: PREFERENCES,
        source: csv::Error::from(e),
    })?;
    read_preferences(file)
}

/// Reads pre-committed placements. Every row must be well formed.
pub fn read_forced<R: Read>(input: R) -> Result<Vec<ForcedAssignment>, DataError> {
    let mut rdr = reader(input);
    let csv_err = |source| DataError::Csv { table: FORCED, source };

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let student_col = column(&headers, FORCED, "Student")?;
    let title_col = column(&headers, FORCED, "Workshop Title")?;
    let day_col = column(&headers, FORCED, "Day")?;
    let session_col = column(&headers, FORCED, "Session")?;

    let mut forced = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_err)?;
        let row = row_number(&record, index);

        let participant = normalize_participant(&required_text(&record, student_col, FORCED, row, "Student")?);
        let activity = required_text(&record, title_col, FORCED, row, "Workshop Title")?;
        let day = required_text(&record, day_col, FORCED, row, "Day")?;
        let period = required_period(&record, session_col, FORCED, row)?;

        forced.push(ForcedAssignment {
            participant,
            slot: SlotKey::new(activity, day, period),
        });
    }
    Ok(forced)
}

pub fn load_forced<P: AsRef<Path>>(path: P) -> Result<Vec<ForcedAssignment>, DataError> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| DataError::Csv {
        table: FORCED,
        source: csv::Error::from(e),
    })?;
    read_forced(file)
}

/// Activity to zone, first seen wins
#[derive(Debug, Clone, Default, Serialize)]
pub struct ZoneMap {
    zones: HashMap<String, String>,
}

impl ZoneMap {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        let mut zones = HashMap::new();
        for (activity, zone) in pairs {
            zones.entry(activity.clone()).or_insert_with(|| zone.clone());
        }
        ZoneMap { zones }
    }

    pub fn zone_of(&self, activity: &str) -> Option<&str> {
        self.zones.get(activity).map(String::as_str)
    }
}

/// Normalized, immutable input for a run
#[derive(Debug, Clone)]
pub struct Domain {
    pub zones: ZoneMap,
    pub costs: CostMap,
    pub submitted: HashMap<String, NaiveDateTime>,
    pub capacity: CapacityTable,
    pub days: Vec<String>,
}

impl Domain {
    /// Joins the schedule and preference tables. Schedule zones take precedence.
    pub fn assemble(schedule: ScheduleTable, preferences: PreferenceTable) -> Result<Self, DataError> {
        let zones = ZoneMap::from_pairs(schedule.zones.iter().chain(preferences.zones.iter()));

        for slot in schedule.slots.keys() {
            if zones.zone_of(&slot.activity).is_none() {
                return Err(DataError::UnknownZone {
                    activity: slot.activity.clone(),
                });
            }
        }

        Ok(Domain {
            zones,
            costs: preferences.costs,
            submitted: preferences.submitted,
            capacity: CapacityTable::new(schedule.slots),
            days: schedule.days,
        })
    }

    /// Zones of scheduled activities, sorted
    pub fn scheduled_zones(&self) -> BTreeSet<&str> {
        self.capacity
            .iter()
            .filter_map(|(slot, _)| self.zones.zone_of(&slot.activity))
            .collect()
    }

    /// Cost of an unranked pair: the configured penalty, but always worse than any real rank
    pub fn unranked_penalty(&self, configured: u32) -> u32 {
        configured.max(self.costs.max_rank() + 1)
    }
}
