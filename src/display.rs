use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::schedule::{Assignment, Cohort, Feasibility, SoloCheck, RunReport};

/// Output row, in the column order the downstream sheets expect
#[derive(Debug, Serialize)]
struct AssignmentRecord<'a> {
    #[serde(rename = "Student")]
    student: &'a str,
    #[serde(rename = "Zone")]
    zone: &'a str,
    #[serde(rename = "Day")]
    day: &'a str,
    #[serde(rename = "Session")]
    session: u8,
    #[serde(rename = "Workshop Title")]
    workshop_title: &'a str,
}

impl<'a> From<&'a Assignment> for AssignmentRecord<'a> {
    fn from(row: &'a Assignment) -> Self {
        AssignmentRecord {
            student: &row.participant,
            zone: &row.zone,
            day: &row.day,
            session: row.period.session(),
            workshop_title: &row.activity,
        }
    }
}

/// Writes assignments as CSV, one row per placement, keeping their order
pub fn write_assignments<W: Write>(out: W, assignments: &[Assignment]) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(out);
    if assignments.is_empty() {
        wtr.write_record(["Student", "Zone", "Day", "Session", "Workshop Title"])?;
    }
    for row in assignments {
        wtr.serialize(AssignmentRecord::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_assignments_to_file(path: &Path, assignments: &[Assignment]) -> Result<(), csv::Error> {
    let file = File::create(path)?;
    write_assignments(file, assignments)
}

pub fn write_report_to_file(path: &Path, report: &RunReport) -> io::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

/// Prints one line per participant checked alone
pub fn print_check_results(cohort: &Cohort, results: &[SoloCheck]) {
    println!("\n=== Cohort {} ({}) ===", cohort.index, cohort.label);
    if results.is_empty() {
        println!("  (no participants)");
    }
    for result in results {
        let status = match result.outcome {
            Feasibility::Feasible => "ok",
            Feasibility::Infeasible => "FAILS",
            Feasibility::Undetermined => "UNKNOWN",
        };
        println!("  {:<8}{}", status, result.participant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Period;

    #[test]
    fn test_assignment_csv_layout() {
        let rows = vec![
            Assignment {
                participant: "jesse wolters".to_string(),
                zone: "Water".to_string(),
                day: "Tuesday".to_string(),
                period: Period::Morning,
                activity: "Vissen".to_string(),
            },
            Assignment {
                participant: "jesse wolters".to_string(),
                zone: "Farm".to_string(),
                day: "Thursday".to_string(),
                period: Period::FullDay,
                activity: "Naar de kaasboerderij".to_string(),
            },
        ];
        let mut buf = Vec::new();
        write_assignments(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Student,Zone,Day,Session,Workshop Title\n\
             jesse wolters,Water,Tuesday,1,Vissen\n\
             jesse wolters,Farm,Thursday,0,Naar de kaasboerderij\n"
        );
    }

    #[test]
    fn test_empty_output_still_has_header() {
        let mut buf = Vec::new();
        write_assignments(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Student,Zone,Day,Session,Workshop Title\n");
    }
}
