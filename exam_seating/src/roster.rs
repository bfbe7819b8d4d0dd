//! Roster reconciliation: merging imported tabular rows into the student
//! state of an exam.
//!
//! Rows arrive as `column name -> value` maps from any tabular source
//! (spreadsheet tab, CSV file, roster API). The merge engine never performs
//! I/O: it reads the exam snapshot, applies the configured strategies row by
//! row, and returns deltas for the caller to persist.

use log::{debug, info, warn};

use std::collections::{BTreeSet, HashSet};

use crate::config::*;
use crate::is_seat_valid_for_preference;

/// Prefix marking a column as a room reference rather than a seat attribute.
pub const ROOM_ATTR_PREFIX: &str = "room:";

/// Renders a room id as an import column name ("room:12").
pub fn room_id_to_attr(room_id: RoomId) -> String {
    format!("{}{}", ROOM_ATTR_PREFIX, room_id.0)
}

/// The structural meaning of one import column. Anything that is not
/// structurally significant is a generic attribute flag.
#[derive(Eq, PartialEq, Debug, Clone)]
enum ColumnKind<'a> {
    CanvasId,
    Email,
    Name,
    StudentId,
    Emailed,
    SeatRef,
    RoomName,
    SeatName,
    PublicSeatUrl,
    RoomRef(&'a str),
    Attribute(&'a str),
}

fn classify_column(header: &str) -> ColumnKind<'_> {
    match header {
        "bcourses id" | "canvas id" => ColumnKind::CanvasId,
        "email" => ColumnKind::Email,
        "name" => ColumnKind::Name,
        "student id" => ColumnKind::StudentId,
        "emailed" => ColumnKind::Emailed,
        "seat id" | "assignment" => ColumnKind::SeatRef,
        "session name" | "room name" => ColumnKind::RoomName,
        "seat name" => ColumnKind::SeatName,
        "public seat url" => ColumnKind::PublicSeatUrl,
        h if h.starts_with(ROOM_ATTR_PREFIX) => ColumnKind::RoomRef(&h[ROOM_ATTR_PREFIX.len()..]),
        h => ColumnKind::Attribute(h),
    }
}

// Strategy-parameterized merges. Each axis applies one of these to its own
// fields; new students always take the row side.

fn combine_info(strategy: UpdatedRowImportStrategy, row: Option<&str>, existing: &str) -> String {
    match strategy {
        UpdatedRowImportStrategy::Overwrite => row.unwrap_or("").to_string(),
        UpdatedRowImportStrategy::Merge => match row {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => existing.to_string(),
        },
        UpdatedRowImportStrategy::Ignore => existing.to_string(),
    }
}

fn combine_opt_info(
    strategy: UpdatedRowImportStrategy,
    row: Option<&str>,
    existing: Option<&String>,
) -> Option<String> {
    let combined = combine_info(strategy, row, existing.map(String::as_str).unwrap_or(""));
    if combined.is_empty() {
        None
    } else {
        Some(combined)
    }
}

fn combine_sets(
    strategy: UpdatedRowImportStrategy,
    row: &BTreeSet<String>,
    existing: &BTreeSet<String>,
) -> BTreeSet<String> {
    match strategy {
        UpdatedRowImportStrategy::Overwrite => row.clone(),
        UpdatedRowImportStrategy::Merge => row.union(existing).cloned().collect(),
        UpdatedRowImportStrategy::Ignore => existing.clone(),
    }
}

/// The attribute flags of one row, partitioned by column kind and value.
#[derive(Debug, Clone, Default)]
struct RowPreference {
    wants: BTreeSet<String>,
    avoids: BTreeSet<String>,
    room_wants: BTreeSet<String>,
    room_avoids: BTreeSet<String>,
}

fn row_preference(row: &ImportRow) -> RowPreference {
    let mut pref = RowPreference::default();
    for (header, value) in row.iter() {
        let lowered = header.to_lowercase();
        let truthy = match value.to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            // Anything else is not a flag; the column is skipped for this row.
            _ => continue,
        };
        match classify_column(lowered.as_str()) {
            ColumnKind::Attribute(attr) => {
                if truthy {
                    pref.wants.insert(attr.to_string());
                } else {
                    pref.avoids.insert(attr.to_string());
                }
            }
            ColumnKind::RoomRef(room_id) => {
                if truthy {
                    pref.room_wants.insert(room_id.to_string());
                } else {
                    pref.room_avoids.insert(room_id.to_string());
                }
            }
            _ => {}
        }
    }
    pref
}

fn non_empty<'a>(row: &'a ImportRow, key: &str) -> Option<&'a str> {
    row.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Seat bookkeeping local to one merge call. A seat is usable by a row iff
/// it is free in the snapshot (or was freed by an earlier row of this batch)
/// and no earlier row has claimed it.
struct SeatLedger {
    assigned: HashSet<SeatId>,
    freed: HashSet<SeatId>,
    claimed: HashSet<SeatId>,
}

impl SeatLedger {
    fn new(exam: &Exam) -> SeatLedger {
        SeatLedger {
            assigned: exam.assigned_seat_ids(),
            freed: HashSet::new(),
            claimed: HashSet::new(),
        }
    }

    fn available(&self, seat: SeatId) -> bool {
        (!self.assigned.contains(&seat) || self.freed.contains(&seat))
            && !self.claimed.contains(&seat)
    }

    fn free(&mut self, seat: SeatId) {
        self.freed.insert(seat);
    }

    fn claim(&mut self, seat: SeatId) {
        self.claimed.insert(seat);
    }
}

/// Resolves the seat a row refers to, if any, honoring availability and
/// (unless forced) eligibility. Tried in order: an explicit `seat id` or
/// `assignment` column, then a `room name`/`session name` + `seat name`
/// pair. A named seat that cannot be found falls back to any movable seat
/// of the room when the requested name reads as one.
fn resolve_row_seat(
    exam: &Exam,
    row: &ImportRow,
    preference: &Preference,
    ignore_restrictions: bool,
    ledger: &SeatLedger,
) -> Option<SeatId> {
    let usable = |seat: &Seat| {
        ledger.available(seat.id)
            && (ignore_restrictions || is_seat_valid_for_preference(seat, preference))
    };

    if let Some(raw) = non_empty(row, "seat id").or_else(|| non_empty(row, "assignment")) {
        let seat_id = match raw.trim().parse::<u32>() {
            Ok(n) => SeatId(n),
            Err(_) => {
                warn!("resolve_row_seat: seat reference {:?} is not an id", raw);
                return None;
            }
        };
        return match exam.seat(seat_id) {
            Some(seat) if usable(seat) => Some(seat_id),
            _ => None,
        };
    }

    let room_name = non_empty(row, "session name").or_else(|| non_empty(row, "room name"))?;
    let seat_name = non_empty(row, "seat name")?;
    let room = exam.rooms.iter().find(|r| r.display_label() == room_name)?;
    let mut candidates: Vec<&Seat> = room
        .seats
        .iter()
        .filter(|s| s.name.as_deref() == Some(seat_name))
        .collect();
    if candidates.is_empty() && seat_name.contains("Movable Seat") {
        candidates = room.seats.iter().filter(|s| s.name.is_none()).collect();
    }
    candidates.into_iter().find(|s| usable(s)).map(|s| s.id)
}

/// Prepares a list of students from imported roster rows, for the given
/// exam.
///
/// Rows are processed strictly in input order; a seat claimed by an earlier
/// row is off limits for every later row of the same call. Each row is
/// filed into exactly one of the result lists. Nothing is persisted: the
/// caller saves new and updated students, deletes the ids queued for
/// deletion, and surfaces invalid rows to the operator.
pub fn prepare_students(
    exam: &Exam,
    headers: &HashSet<String>,
    rows: &[ImportRow],
    config: &StudentImportConfig,
) -> Result<ImportResult, SeatingErrors> {
    if !headers.contains("email") {
        return Err(SeatingErrors::DataValidation(
            "missing \"email\" column".to_string(),
        ));
    } else if !headers.contains("name") {
        return Err(SeatingErrors::DataValidation(
            "missing \"name\" column".to_string(),
        ));
    } else if !headers.contains("bcourses id") && !headers.contains("canvas id") {
        return Err(SeatingErrors::DataValidation(
            "missing \"canvas id\" column".to_string(),
        ));
    }

    info!(
        "prepare_students: exam {}: {} row(s) against {} existing student(s), config: {:?}",
        exam.id.0,
        rows.len(),
        exam.students.len(),
        config
    );

    let mut result = ImportResult::default();
    let mut ledger = SeatLedger::new(exam);
    let mut next_id: u32 = exam.students.iter().map(|s| s.id.0).max().unwrap_or(0);

    for row in rows.iter() {
        let canvas_id = match non_empty(row, "bcourses id").or_else(|| non_empty(row, "canvas id"))
        {
            Some(c) => c.to_string(),
            None => {
                warn!("prepare_students: row without canvas id: {:?}", row);
                result.invalid_rows.push(row.clone());
                continue;
            }
        };

        let existing = exam.student_by_canvas_id(&canvas_id);
        let is_new = existing.is_none();
        if is_new && config.new_student_import_strategy == NewRowImportStrategy::Ignore {
            debug!("prepare_students: unseen canvas id {} rejected", canvas_id);
            result.invalid_rows.push(row.clone());
            continue;
        }

        let base = match existing {
            Some(s) => s.clone(),
            None => Student {
                id: StudentId(next_id + 1),
                canvas_id: canvas_id.clone(),
                name: String::new(),
                email: String::new(),
                sid: None,
                wants: BTreeSet::new(),
                avoids: BTreeSet::new(),
                room_wants: BTreeSet::new(),
                room_avoids: BTreeSet::new(),
                assignment: None,
            },
        };

        // Identity fields. New students always take the row values.
        let info_strategy = if is_new {
            UpdatedRowImportStrategy::Overwrite
        } else {
            config.updated_student_info_import_strategy
        };
        let name = combine_info(info_strategy, row.get("name").map(String::as_str), &base.name);
        let email = combine_info(
            info_strategy,
            row.get("email").map(String::as_str),
            &base.email,
        );
        if name.is_empty() || email.is_empty() {
            debug!(
                "prepare_students: canvas id {}: no usable name or email",
                canvas_id
            );
            result.invalid_rows.push(row.clone());
            continue;
        }
        let sid = combine_opt_info(
            info_strategy,
            row.get("student id").map(String::as_str),
            base.sid.as_ref(),
        );
        let emailed = row.get("emailed").map(String::as_str).unwrap_or("false") == "true";

        // Preference fields: wants and avoids must stay mutually exclusive.
        let pref_strategy = if is_new {
            UpdatedRowImportStrategy::Overwrite
        } else {
            config.updated_preference_import_strategy
        };
        let from_row = row_preference(row);
        let wants = combine_sets(pref_strategy, &from_row.wants, &base.wants);
        let avoids = combine_sets(pref_strategy, &from_row.avoids, &base.avoids);
        let room_wants = combine_sets(pref_strategy, &from_row.room_wants, &base.room_wants);
        let room_avoids = combine_sets(pref_strategy, &from_row.room_avoids, &base.room_avoids);
        if !wants.is_disjoint(&avoids) || !room_wants.is_disjoint(&room_avoids) {
            warn!(
                "prepare_students: canvas id {}: conflicting wants and avoids",
                canvas_id
            );
            result.invalid_rows.push(row.clone());
            continue;
        }

        let mut student = Student {
            name,
            email,
            sid,
            wants,
            avoids,
            room_wants,
            room_avoids,
            ..base
        };
        let preference = Preference::from_student(&student);

        // An assignment that predates this import may have become
        // inconsistent with the updated preference.
        if config.revalidate_existing_assignments {
            if let Some(assignment) = student.assignment {
                let still_valid = exam
                    .seat(assignment.seat_id)
                    .map(|seat| is_seat_valid_for_preference(seat, &preference))
                    .unwrap_or(false);
                if !still_valid {
                    debug!(
                        "prepare_students: canvas id {}: clearing stale assignment on seat {}",
                        canvas_id, assignment.seat_id.0
                    );
                    ledger.free(assignment.seat_id);
                    student.assignment = None;
                }
            }
        }

        if config.assignment_import_strategy != AssignmentImportStrategy::Ignore {
            let ignore_restrictions =
                config.assignment_import_strategy == AssignmentImportStrategy::Force;
            if let Some(seat_id) =
                resolve_row_seat(exam, row, &preference, ignore_restrictions, &ledger)
            {
                if let Some(previous) = student.assignment {
                    ledger.free(previous.seat_id);
                }
                ledger.claim(seat_id);
                student.assignment = Some(SeatAssignment {
                    student_id: student.id,
                    seat_id,
                    emailed,
                });
            }
        }

        if is_new {
            next_id += 1;
            result.new_students.push(student);
        } else {
            result.updated_students.push(student);
        }
    }

    if config.missing_student_import_strategy == MissingRowImportStrategy::Delete {
        let seen: HashSet<&str> = result
            .new_students
            .iter()
            .chain(result.updated_students.iter())
            .map(|s| s.canvas_id.as_str())
            .collect();
        for student in exam.students.iter() {
            if !seen.contains(student.canvas_id.as_str()) {
                result.student_ids_to_delete.push(student.id);
            }
        }
    }

    info!(
        "prepare_students: {} new, {} updated, {} invalid, {} queued for deletion",
        result.new_students.len(),
        result.updated_students.len(),
        result.invalid_rows.len(),
        result.student_ids_to_delete.len()
    );
    Ok(result)
}
