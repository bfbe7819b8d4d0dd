// ********* Input data structures ***********

use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::fmt::Display;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ExamId(pub u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct RoomId(pub u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct SeatId(pub u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct StudentId(pub u32);

/// An assignable physical location in a room.
///
/// Placed seats carry a name derived from their row and seat letter ("B12").
/// Movable seats have no name and are interchangeable within their room.
/// Attribute tags are free text and compared case-insensitively.
#[derive(PartialEq, Debug, Clone)]
pub struct Seat {
    pub id: SeatId,
    pub room_id: RoomId,
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub attributes: HashSet<String>,
    pub fixed: bool,
}

impl Seat {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Movable Seat")
    }
}

/// A room session of an exam: a named collection of seats, with an optional
/// start time for exams split over several sittings of the same room.
#[derive(PartialEq, Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    /// Slug form of the display name, unique within an exam and start time.
    pub name: String,
    pub display_name: String,
    /// ISO-8601 start time, when this room runs at a specific sitting.
    pub start_at: Option<String>,
    pub duration_minutes: Option<u32>,
    pub seats: Vec<Seat>,
}

impl Room {
    /// The label shown to operators and matched against the `room name`
    /// column of roster imports.
    pub fn display_label(&self) -> String {
        match &self.start_at {
            Some(t) => format!("{} ({})", self.display_name, t),
            None => self.display_name.clone(),
        }
    }
}

/// A committed student-to-seat pairing. `emailed` records whether a
/// notification went out for this particular pairing.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct SeatAssignment {
    pub student_id: StudentId,
    pub seat_id: SeatId,
    pub emailed: bool,
}

/// An exam-taker. The four constraint sets drive seat eligibility:
/// `wants`/`avoids` name seat attributes (stored lower-cased), and
/// `room_wants`/`room_avoids` name room ids encoded as strings.
///
/// Invariants: `wants` is disjoint from `avoids`, and `room_wants` is
/// disjoint from `room_avoids`. The roster merge engine never produces a
/// student violating them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Student {
    pub id: StudentId,
    /// External roster identity, unique within an exam.
    pub canvas_id: String,
    pub name: String,
    pub email: String,
    /// Secondary institutional id, when known.
    pub sid: Option<String>,
    pub wants: BTreeSet<String>,
    pub avoids: BTreeSet<String>,
    pub room_wants: BTreeSet<String>,
    pub room_avoids: BTreeSet<String>,
    pub assignment: Option<SeatAssignment>,
}

/// A fully hydrated exam snapshot: rooms with their seats, and students with
/// their current assignments. The engines only read from it; callers own
/// loading it and persisting any returned deltas.
#[derive(PartialEq, Debug, Clone)]
pub struct Exam {
    pub id: ExamId,
    pub name: String,
    pub rooms: Vec<Room>,
    pub students: Vec<Student>,
}

impl Exam {
    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.rooms.iter().flat_map(|r| r.seats.iter())
    }

    pub fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats().find(|s| s.id == id)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn student_by_canvas_id(&self, canvas_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.canvas_id == canvas_id)
    }

    /// Seats currently held by an assignment of any student in the snapshot.
    pub fn assigned_seat_ids(&self) -> HashSet<SeatId> {
        self.students
            .iter()
            .filter_map(|s| s.assignment.as_ref().map(|a| a.seat_id))
            .collect()
    }

    /// Seats with no active assignment, in room order then seat order.
    pub fn unassigned_seats(&self) -> Vec<&Seat> {
        let taken = self.assigned_seat_ids();
        self.seats().filter(|s| !taken.contains(&s.id)).collect()
    }

    /// Students with no active assignment, in input order.
    pub fn unassigned_students(&self) -> Vec<&Student> {
        self.students
            .iter()
            .filter(|s| s.assignment.is_none())
            .collect()
    }
}

/// A student's constraints, detached from the student record so that equal
/// constraint sets group together. Two preferences are equal iff all four
/// sets are equal; the grouping key of the assignment engine.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub struct Preference {
    pub wants: BTreeSet<String>,
    pub avoids: BTreeSet<String>,
    pub room_wants: BTreeSet<String>,
    pub room_avoids: BTreeSet<String>,
}

impl Preference {
    pub fn from_student(student: &Student) -> Preference {
        Preference {
            wants: student.wants.clone(),
            avoids: student.avoids.clone(),
            room_wants: student.room_wants.clone(),
            room_avoids: student.room_avoids.clone(),
        }
    }

    /// Canonical rendering used as a tie-break key. Set iteration is sorted,
    /// so equal preferences always produce the same string.
    pub(crate) fn fingerprint(&self) -> String {
        fn join(s: &BTreeSet<String>) -> String {
            s.iter().cloned().collect::<Vec<String>>().join(",")
        }
        format!(
            "w={};a={};rw={};ra={}",
            join(&self.wants),
            join(&self.avoids),
            join(&self.room_wants),
            join(&self.room_avoids)
        )
    }
}

impl Display for Preference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Preference(wants={:?}, avoids={:?}, room_wants={:?}, room_avoids={:?})",
            self.wants, self.avoids, self.room_wants, self.room_avoids
        )
    }
}

// ******** Output data structures *********

/// One imported roster row: column name to cell value. Column names are
/// lower-cased by the reader layer.
pub type ImportRow = HashMap<String, String>;

/// The deltas produced by one roster merge call. Nothing is persisted by the
/// engine; the caller saves new and updated students, deletes the listed
/// student ids, and reports invalid rows to the operator.
///
/// Ids on new students are provisional (allocated past the snapshot's
/// maximum); a persistence layer may renumber them.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ImportResult {
    pub new_students: Vec<Student>,
    pub updated_students: Vec<Student>,
    pub invalid_rows: Vec<ImportRow>,
    pub student_ids_to_delete: Vec<StudentId>,
}

/// Errors that prevent an engine call from completing. Row-level problems
/// are not errors: they land in [`ImportResult::invalid_rows`].
#[derive(PartialEq, Debug, Clone)]
pub enum SeatingErrors {
    /// A constrained student group ran out of eligible seats. Carries the
    /// blocked students and the preference none of the remaining seats can
    /// satisfy.
    NotEnoughSeats {
        exam: ExamId,
        students: Vec<Student>,
        preference: Preference,
    },
    /// A caller-specified seat is taken, foreign to the exam, or not allowed
    /// by the student's preference.
    SeatOverride { student: Box<Student>, seat: SeatId },
    /// The import batch is structurally unusable (missing required columns,
    /// malformed sheet). Raised before any row is processed.
    DataValidation(String),
}

impl Error for SeatingErrors {}

impl Display for SeatingErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeatingErrors::NotEnoughSeats {
                exam,
                students,
                preference,
            } => write!(
                f,
                "not enough seats in exam {}: {} student(s) blocked on {}",
                exam.0,
                students.len(),
                preference
            ),
            SeatingErrors::SeatOverride { student, seat } => write!(
                f,
                "seat {} cannot be given to student {}: it is already taken, \
                 does not exist in the exam, or does not meet the student's requirements",
                seat.0, student.name
            ),
            SeatingErrors::DataValidation(msg) => write!(f, "{}", msg),
        }
    }
}

// ********* Configuration **********

// The import options. They follow the import strategies of the seating
// roster reconciliation, one independent axis per kind of change.

/// What to do with a seat reference supplied by a roster row.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AssignmentImportStrategy {
    /// Never touch assignments from row data.
    Ignore,
    /// Accept a row-supplied seat only if it is free and eligible under the
    /// student's (possibly just-updated) preference.
    Revalidate,
    /// Accept a row-supplied seat if merely free, skipping the eligibility
    /// check.
    Force,
}

/// What to do with row data for a student that already exists.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UpdatedRowImportStrategy {
    /// Leave the stored values untouched.
    Ignore,
    /// Take the row value unless it is blank, falling back to the stored one.
    Merge,
    /// Take the row value outright, even when blank.
    Overwrite,
}

/// Whether unseen canvas ids become new student records.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum NewRowImportStrategy {
    /// Reject rows with unseen canvas ids as invalid.
    Ignore,
    /// Append them as new students.
    Append,
}

/// What to do with existing students whose canvas id never appeared in the
/// import batch.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MissingRowImportStrategy {
    Ignore,
    /// Queue them for deletion by the caller.
    Delete,
}

/// The policy axes of one roster merge call. Any subset of fields can be
/// overridden from [`StudentImportConfig::DEFAULT`] with struct update
/// syntax.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct StudentImportConfig {
    pub assignment_import_strategy: AssignmentImportStrategy,
    pub updated_student_info_import_strategy: UpdatedRowImportStrategy,
    pub updated_preference_import_strategy: UpdatedRowImportStrategy,
    pub new_student_import_strategy: NewRowImportStrategy,
    pub missing_student_import_strategy: MissingRowImportStrategy,
    /// Clear an existing assignment whose seat no longer satisfies the
    /// (possibly updated) preference, before any row-supplied seat applies.
    pub revalidate_existing_assignments: bool,
}

impl StudentImportConfig {
    pub const DEFAULT: StudentImportConfig = StudentImportConfig {
        assignment_import_strategy: AssignmentImportStrategy::Revalidate,
        updated_student_info_import_strategy: UpdatedRowImportStrategy::Merge,
        updated_preference_import_strategy: UpdatedRowImportStrategy::Overwrite,
        new_student_import_strategy: NewRowImportStrategy::Append,
        missing_student_import_strategy: MissingRowImportStrategy::Ignore,
        revalidate_existing_assignments: true,
    };
}

impl Default for StudentImportConfig {
    fn default() -> Self {
        StudentImportConfig::DEFAULT
    }
}

/// How ties between equally constrained groups, students and seats are
/// broken during assignment.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// First in input order. Fully deterministic without a seed.
    InputOrder,
    // Note: the random mode does not draw from process entropy. It applies a
    // cryptographic hash keyed on the seed, so a fixed seed reproduces the
    // same seating chart.
    Random(u32),
}

/// The rules that govern one assignment run.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct AssignRules {
    pub tiebreak_mode: TieBreakMode,
}

impl AssignRules {
    pub const DEFAULT_RULES: AssignRules = AssignRules {
        tiebreak_mode: TieBreakMode::InputOrder,
    };
}

impl Default for AssignRules {
    fn default() -> Self {
        AssignRules::DEFAULT_RULES
    }
}
