use log::{info, warn};

use exam_seating::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, HashSet};
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::seating::config_reader::*;

pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;

#[derive(Debug, Snafu)]
pub enum SeatplanError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display(""))]
    EmptyExcel {},
    #[snafu(display("Error opening CSV file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display(""))]
    OpeningJson { source: std::io::Error },
    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display(""))]
    WritingSummary { source: std::io::Error },

    #[snafu(display("{source}"))]
    Seating { source: SeatingErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SeatplanResult<T> = Result<T, SeatplanError>;

pub mod config_reader {
    use crate::seating::*;

    /// The optional JSON run configuration. Both sections may be omitted;
    /// library defaults apply to every unset field.
    #[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RunConfig {
        #[serde(rename = "importRules")]
        pub import_rules: Option<ImportRulesConfig>,
        #[serde(rename = "assignRules")]
        pub assign_rules: Option<AssignRulesConfig>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ImportRulesConfig {
        #[serde(rename = "assignmentImportStrategy")]
        pub assignment_import_strategy: Option<String>,
        #[serde(rename = "updatedStudentInfoImportStrategy")]
        pub updated_student_info_import_strategy: Option<String>,
        #[serde(rename = "updatedPreferenceImportStrategy")]
        pub updated_preference_import_strategy: Option<String>,
        #[serde(rename = "newStudentImportStrategy")]
        pub new_student_import_strategy: Option<String>,
        #[serde(rename = "missingStudentImportStrategy")]
        pub missing_student_import_strategy: Option<String>,
        #[serde(rename = "revalidateExistingAssignments")]
        pub revalidate_existing_assignments: Option<bool>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
    pub struct AssignRulesConfig {
        #[serde(rename = "tiebreakMode")]
        pub tiebreak_mode: Option<String>,
        #[serde(rename = "randomSeed")]
        pub random_seed: Option<String>,
    }

    // The exam snapshot file.

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ExamFile {
        #[serde(rename = "examId")]
        pub exam_id: u32,
        pub name: String,
        #[serde(default)]
        pub rooms: Vec<RoomFile>,
        #[serde(default)]
        pub students: Vec<StudentFile>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct RoomFile {
        pub id: u32,
        /// Slug name; derived from the display name when absent.
        pub name: Option<String>,
        #[serde(rename = "displayName")]
        pub display_name: String,
        #[serde(rename = "startAt")]
        pub start_at: Option<String>,
        #[serde(rename = "durationMinutes")]
        pub duration_minutes: Option<u32>,
        #[serde(default)]
        pub seats: Vec<SeatFile>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct SeatFile {
        pub id: u32,
        pub name: Option<String>,
        pub x: f64,
        pub y: f64,
        pub fixed: Option<bool>,
        #[serde(default)]
        pub attributes: Vec<String>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct StudentFile {
        pub id: u32,
        #[serde(rename = "canvasId")]
        pub canvas_id: String,
        pub name: String,
        pub email: String,
        pub sid: Option<String>,
        #[serde(default)]
        pub wants: Vec<String>,
        #[serde(default)]
        pub avoids: Vec<String>,
        #[serde(rename = "roomWants", default)]
        pub room_wants: Vec<String>,
        #[serde(rename = "roomAvoids", default)]
        pub room_avoids: Vec<String>,
        pub assignment: Option<AssignmentFile>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct AssignmentFile {
        #[serde(rename = "seatId")]
        pub seat_id: u32,
        #[serde(default)]
        pub emailed: bool,
    }

    pub fn read_exam(path: &str) -> SeatplanResult<Exam> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        let file: ExamFile =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(build_exam(&file))
    }

    /// Maps the file shape onto the library model.
    pub fn build_exam(file: &ExamFile) -> Exam {
        Exam {
            id: ExamId(file.exam_id),
            name: file.name.clone(),
            rooms: file
                .rooms
                .iter()
                .map(|r| Room {
                    id: RoomId(r.id),
                    name: r
                        .name
                        .clone()
                        .unwrap_or_else(|| exam_seating::builder::slug(&r.display_name)),
                    display_name: r.display_name.clone(),
                    start_at: r.start_at.clone(),
                    duration_minutes: r.duration_minutes,
                    seats: r
                        .seats
                        .iter()
                        .map(|s| Seat {
                            id: SeatId(s.id),
                            room_id: RoomId(r.id),
                            name: s.name.clone(),
                            x: s.x,
                            y: s.y,
                            attributes: s.attributes.iter().cloned().collect(),
                            fixed: s.fixed.unwrap_or(true),
                        })
                        .collect(),
                })
                .collect(),
            students: file
                .students
                .iter()
                .map(|s| Student {
                    id: StudentId(s.id),
                    canvas_id: s.canvas_id.clone(),
                    name: s.name.clone(),
                    email: s.email.clone(),
                    sid: s.sid.clone(),
                    wants: s.wants.iter().cloned().collect(),
                    avoids: s.avoids.iter().cloned().collect(),
                    room_wants: s.room_wants.iter().cloned().collect(),
                    room_avoids: s.room_avoids.iter().cloned().collect(),
                    assignment: s.assignment.as_ref().map(|a| SeatAssignment {
                        student_id: StudentId(s.id),
                        seat_id: SeatId(a.seat_id),
                        emailed: a.emailed,
                    }),
                })
                .collect(),
        }
    }

    pub fn read_run_config(path: Option<&String>) -> SeatplanResult<RunConfig> {
        match path {
            None => Ok(RunConfig::default()),
            Some(p) => {
                let contents = fs::read_to_string(p).context(OpeningJsonSnafu {})?;
                serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
            }
        }
    }

    pub fn read_summary(path: &str) -> SeatplanResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
    }
}

fn updated_row_strategy(value: &str) -> Option<UpdatedRowImportStrategy> {
    match value {
        "ignore" => Some(UpdatedRowImportStrategy::Ignore),
        "merge" => Some(UpdatedRowImportStrategy::Merge),
        "overwrite" => Some(UpdatedRowImportStrategy::Overwrite),
        _ => None,
    }
}

fn validate_import_rules(
    rules: &Option<ImportRulesConfig>,
) -> SeatplanResult<StudentImportConfig> {
    let mut res = StudentImportConfig::DEFAULT;
    let rules = match rules {
        Some(r) => r,
        None => return Ok(res),
    };
    if let Some(s) = &rules.assignment_import_strategy {
        res.assignment_import_strategy = match s.as_str() {
            "ignore" => AssignmentImportStrategy::Ignore,
            "revalidate" => AssignmentImportStrategy::Revalidate,
            "force" => AssignmentImportStrategy::Force,
            x => whatever!("Cannot use assignment import strategy {:?}", x),
        };
    }
    if let Some(s) = &rules.updated_student_info_import_strategy {
        res.updated_student_info_import_strategy = match updated_row_strategy(s) {
            Some(x) => x,
            None => whatever!("Cannot use student info import strategy {:?}", s),
        };
    }
    if let Some(s) = &rules.updated_preference_import_strategy {
        res.updated_preference_import_strategy = match updated_row_strategy(s) {
            Some(x) => x,
            None => whatever!("Cannot use preference import strategy {:?}", s),
        };
    }
    if let Some(s) = &rules.new_student_import_strategy {
        res.new_student_import_strategy = match s.as_str() {
            "ignore" => NewRowImportStrategy::Ignore,
            "append" => NewRowImportStrategy::Append,
            x => whatever!("Cannot use new student import strategy {:?}", x),
        };
    }
    if let Some(s) = &rules.missing_student_import_strategy {
        res.missing_student_import_strategy = match s.as_str() {
            "ignore" => MissingRowImportStrategy::Ignore,
            "delete" => MissingRowImportStrategy::Delete,
            x => whatever!("Cannot use missing student import strategy {:?}", x),
        };
    }
    if let Some(b) = rules.revalidate_existing_assignments {
        res.revalidate_existing_assignments = b;
    }
    Ok(res)
}

fn validate_assign_rules(rules: &Option<AssignRulesConfig>) -> SeatplanResult<AssignRules> {
    let mut res = AssignRules::DEFAULT_RULES;
    let rules = match rules {
        Some(r) => r,
        None => return Ok(res),
    };
    if let Some(mode) = &rules.tiebreak_mode {
        res.tiebreak_mode = match mode.as_str() {
            "inputOrder" => TieBreakMode::InputOrder,
            "random" => {
                let seed = match rules.random_seed.clone().map(|s| s.parse::<u32>()) {
                    Some(Result::Ok(x)) => x,
                    x => {
                        whatever!("Cannot use tiebreak mode random without a valid seed: {:?}", x)
                    }
                };
                TieBreakMode::Random(seed)
            }
            x => {
                whatever!("Cannot use tiebreak mode {:?} (currently not implemented)", x)
            }
        };
    }
    Ok(res)
}

fn seat_label(exam: &Exam, seat_id: SeatId) -> (String, String) {
    let found = exam
        .rooms
        .iter()
        .find_map(|r| r.seats.iter().find(|s| s.id == seat_id).map(|s| (r, s)));
    match found {
        Some((room, seat)) => (room.display_label(), seat.display_name().to_string()),
        None => ("?".to_string(), "?".to_string()),
    }
}

fn assignment_to_json(exam: &Exam, a: &SeatAssignment) -> JSValue {
    let (room, seat) = seat_label(exam, a.seat_id);
    json!({
        "seatId": a.seat_id.0,
        "room": room,
        "seat": seat,
        "emailed": a.emailed
    })
}

fn student_to_json(exam: &Exam, s: &Student) -> JSValue {
    json!({
        "canvasId": s.canvas_id,
        "name": s.name,
        "email": s.email,
        "sid": s.sid,
        "wants": s.wants.iter().cloned().collect::<Vec<String>>(),
        "avoids": s.avoids.iter().cloned().collect::<Vec<String>>(),
        "roomWants": s.room_wants.iter().cloned().collect::<Vec<String>>(),
        "roomAvoids": s.room_avoids.iter().cloned().collect::<Vec<String>>(),
        "assignment": s.assignment.as_ref().map(|a| assignment_to_json(exam, a)),
    })
}

fn import_result_to_json(exam: &Exam, result: &ImportResult) -> JSValue {
    // Invalid rows pass through ordered maps so the summary is stable for
    // reference comparison.
    let invalid: Vec<BTreeMap<String, String>> = result
        .invalid_rows
        .iter()
        .map(|r| r.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .collect();
    json!({
        "newStudents": result
            .new_students
            .iter()
            .map(|s| student_to_json(exam, s))
            .collect::<Vec<JSValue>>(),
        "updatedStudents": result
            .updated_students
            .iter()
            .map(|s| student_to_json(exam, s))
            .collect::<Vec<JSValue>>(),
        "invalidRows": invalid,
        "studentIdsToDelete": result
            .student_ids_to_delete
            .iter()
            .map(|id| id.0)
            .collect::<Vec<u32>>(),
    })
}

fn build_summary_js(exam: &Exam, mode: &str, results: JSValue) -> JSValue {
    json!({
        "exam": { "id": exam.id.0, "name": exam.name },
        "mode": mode,
        "results": results
    })
}

fn write_summary(args: &Args, summary: &JSValue) -> SeatplanResult<()> {
    let pretty = serde_json::to_string_pretty(summary).context(ParsingJsonSnafu {})?;
    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty),
        Some(path) => {
            fs::write(path, &pretty).context(WritingSummarySnafu {})?;
            info!("write_summary: summary written to {}", path);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = &args.reference {
        let reference = read_summary(reference_path)?;
        let pretty_ref = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_ref != pretty {
            warn!("Found differences with the reference summary");
            print_diff(pretty_ref.as_str(), pretty.as_ref(), "\n");
            whatever!("Difference detected between produced summary and reference summary")
        }
    }
    Ok(())
}

fn read_roster(args: &Args, path: &str) -> SeatplanResult<(HashSet<String>, Vec<ImportRow>)> {
    match args.input_type.as_deref().unwrap_or("csv") {
        "csv" => io_csv::read_csv_roster(path),
        "xlsx" => io_xlsx::read_xlsx_roster(path, args.excel_worksheet_name.as_deref()),
        x => whatever!("Input type not implemented {:?}", x),
    }
}

pub fn run_import(args: &Args) -> SeatplanResult<()> {
    let exam = read_exam(args.exam.as_str())?;
    let run_config = read_run_config(args.config.as_ref())?;
    let rules = validate_import_rules(&run_config.import_rules)?;
    info!("run_import: rules: {:?}", rules);

    let input = match &args.input {
        Some(p) => p.clone(),
        None => whatever!("import mode requires --input"),
    };
    let (headers, rows) = read_roster(args, input.as_str())?;
    info!("run_import: {} roster row(s) read from {}", rows.len(), input);

    let result = prepare_students(&exam, &headers, &rows, &rules).context(SeatingSnafu {})?;
    let summary = build_summary_js(&exam, "import", import_result_to_json(&exam, &result));
    write_summary(args, &summary)
}

pub fn run_assign(args: &Args) -> SeatplanResult<()> {
    let exam = read_exam(args.exam.as_str())?;
    let run_config = read_run_config(args.config.as_ref())?;
    let rules = validate_assign_rules(&run_config.assign_rules)?;
    info!("run_assign: rules: {:?}", rules);

    let assignments = assign_students(&exam, &rules).context(SeatingSnafu {})?;
    let results = json!({
        "assignments": assignments
            .iter()
            .map(|a| {
                let student = exam.students.iter().find(|s| s.id == a.student_id);
                let (room, seat) = seat_label(&exam, a.seat_id);
                json!({
                    "canvasId": student.map(|s| s.canvas_id.clone()),
                    "student": student.map(|s| s.name.clone()),
                    "room": room,
                    "seat": seat,
                    "seatId": a.seat_id.0
                })
            })
            .collect::<Vec<JSValue>>(),
    });
    let summary = build_summary_js(&exam, "assign", results);
    write_summary(args, &summary)
}

#[cfg(test)]
mod tests {
    use super::config_reader::*;
    use super::*;

    #[test]
    fn import_rules_default_when_unset() {
        let rules = validate_import_rules(&None).unwrap();
        assert_eq!(rules, StudentImportConfig::DEFAULT);
    }

    #[test]
    fn import_rules_accept_a_subset_of_fields() {
        let parsed: RunConfig = serde_json::from_str(
            r#"{ "importRules": { "updatedPreferenceImportStrategy": "merge",
                                  "missingStudentImportStrategy": "delete" } }"#,
        )
        .unwrap();
        let rules = validate_import_rules(&parsed.import_rules).unwrap();
        assert_eq!(
            rules.updated_preference_import_strategy,
            UpdatedRowImportStrategy::Merge
        );
        assert_eq!(
            rules.missing_student_import_strategy,
            MissingRowImportStrategy::Delete
        );
        // Everything else keeps its default.
        assert_eq!(
            rules.assignment_import_strategy,
            AssignmentImportStrategy::Revalidate
        );
        assert!(rules.revalidate_existing_assignments);
    }

    #[test]
    fn unknown_strategy_names_are_rejected() {
        let cfg = ImportRulesConfig {
            new_student_import_strategy: Some("applesauce".to_string()),
            ..ImportRulesConfig::default()
        };
        assert!(validate_import_rules(&Some(cfg)).is_err());
    }

    #[test]
    fn random_tiebreak_requires_a_seed() {
        let cfg = AssignRulesConfig {
            tiebreak_mode: Some("random".to_string()),
            random_seed: None,
        };
        assert!(validate_assign_rules(&Some(cfg)).is_err());

        let cfg = AssignRulesConfig {
            tiebreak_mode: Some("random".to_string()),
            random_seed: Some("42".to_string()),
        };
        let rules = validate_assign_rules(&Some(cfg)).unwrap();
        assert_eq!(rules.tiebreak_mode, TieBreakMode::Random(42));
    }

    #[test]
    fn exam_file_maps_onto_the_model() {
        let file: ExamFile = serde_json::from_str(
            r#"{
                "examId": 3,
                "name": "cs70-final",
                "rooms": [
                    { "id": 1, "displayName": "Soda 306", "startAt": "2026-05-10T08:00",
                      "seats": [
                        { "id": 1, "name": "A1", "x": 0, "y": 0, "attributes": ["lefty"] },
                        { "id": 2, "x": 1, "y": 0, "fixed": false }
                      ] }
                ],
                "students": [
                    { "id": 1, "canvasId": "123456", "name": "John Doe",
                      "email": "john@example.com", "wants": ["lefty"],
                      "assignment": { "seatId": 1 } }
                ]
            }"#,
        )
        .unwrap();
        let exam = build_exam(&file);
        assert_eq!(exam.id, ExamId(3));
        assert_eq!(exam.rooms[0].name, "soda-306");
        assert_eq!(
            exam.rooms[0].display_label(),
            "Soda 306 (2026-05-10T08:00)"
        );
        let seats: Vec<&Seat> = exam.seats().collect();
        assert!(seats[0].fixed && seats[0].attributes.contains("lefty"));
        assert!(!seats[1].fixed && seats[1].name.is_none());
        let student = &exam.students[0];
        assert_eq!(student.wants.iter().next().map(String::as_str), Some("lefty"));
        let a = student.assignment.unwrap();
        assert_eq!((a.seat_id, a.emailed), (SeatId(1), false));
        // The one seat with an assignment is not available anymore.
        assert_eq!(exam.unassigned_seats().len(), 1);
        assert!(exam.unassigned_students().is_empty());
    }
}
