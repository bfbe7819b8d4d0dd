pub use crate::config::*;

use std::collections::{BTreeSet, HashSet};

/// Derives the slug form of a room display name ("Soda 306" -> "soda-306").
pub fn slug(display_name: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for c in display_name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Incremental construction of an exam snapshot.
///
/// Callers adapting an external store assemble the snapshot here; tests use
/// it to set up fixtures without one.
///
/// ```
/// use exam_seating::builder::ExamBuilder;
///
/// let mut builder = ExamBuilder::new(1, "cs70-final");
/// let room = builder.room("Soda 306", None, Some(110));
/// builder.seat(room, Some("A1"), 0.0, 0.0, true, &["lefty"])?;
/// let alice = builder.student("123456", "Alice", "alice@example.com");
/// builder.set_preferences(alice, &["lefty"], &[], &[], &[]);
/// let exam = builder.build();
/// assert_eq!(exam.students.len(), 1);
///
/// # Ok::<(), exam_seating::SeatingErrors>(())
/// ```
pub struct ExamBuilder {
    exam: Exam,
    next_room: u32,
    next_seat: u32,
    next_student: u32,
}

impl ExamBuilder {
    pub fn new(id: u32, name: &str) -> ExamBuilder {
        ExamBuilder {
            exam: Exam {
                id: ExamId(id),
                name: name.to_string(),
                rooms: Vec::new(),
                students: Vec::new(),
            },
            next_room: 0,
            next_seat: 0,
            next_student: 0,
        }
    }

    /// Adds an empty room.
    pub fn room(
        &mut self,
        display_name: &str,
        start_at: Option<&str>,
        duration_minutes: Option<u32>,
    ) -> RoomId {
        self.next_room += 1;
        let id = RoomId(self.next_room);
        self.exam.rooms.push(Room {
            id,
            name: slug(display_name),
            display_name: display_name.to_string(),
            start_at: start_at.map(str::to_string),
            duration_minutes,
            seats: Vec::new(),
        });
        id
    }

    /// Adds one seat to a room. Pass `name: None` for a movable seat.
    pub fn seat(
        &mut self,
        room: RoomId,
        name: Option<&str>,
        x: f64,
        y: f64,
        fixed: bool,
        attributes: &[&str],
    ) -> Result<SeatId, SeatingErrors> {
        self.next_seat += 1;
        let id = SeatId(self.next_seat);
        let room = self
            .exam
            .rooms
            .iter_mut()
            .find(|r| r.id == room)
            .ok_or_else(|| SeatingErrors::DataValidation("unknown room".to_string()))?;
        room.seats.push(Seat {
            id,
            room_id: room.id,
            name: name.map(str::to_string),
            x,
            y,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            fixed,
        });
        Ok(id)
    }

    /// Builds a room out of a seating-chart sheet.
    ///
    /// The sheet must carry `row` and `seat` columns; a seat's name is the
    /// concatenation of the two. Coordinates walk the grid (a new row label
    /// starts the next y line) unless overridden by explicit `x`/`y`
    /// columns. Every other truthy column becomes a seat attribute. Seat
    /// names and coordinates must be unique within the room.
    pub fn room_from_sheet(
        &mut self,
        display_name: &str,
        start_at: Option<&str>,
        duration_minutes: Option<u32>,
        headers: &HashSet<String>,
        rows: &[ImportRow],
    ) -> Result<RoomId, SeatingErrors> {
        if !headers.contains("row") {
            return Err(SeatingErrors::DataValidation(
                "missing \"row\" column".to_string(),
            ));
        } else if !headers.contains("seat") {
            return Err(SeatingErrors::DataValidation(
                "missing \"seat\" column".to_string(),
            ));
        }
        if self.exam.rooms.iter().any(|r| {
            r.name == slug(display_name) && r.start_at.as_deref() == start_at
        }) {
            return Err(SeatingErrors::DataValidation(
                "a room with that name and start time already exists".to_string(),
            ));
        }

        let room_id = RoomId(self.next_room + 1);
        let mut seats: Vec<Seat> = Vec::new();
        let mut x: f64 = 0.0;
        let mut y: f64 = -1.0;
        let mut last_row: Option<String> = None;
        for row in rows.iter() {
            let row_label = row.get("row").cloned().unwrap_or_default();
            let seat_letter = row.get("seat").cloned().unwrap_or_default();
            let name = format!("{}{}", row_label, seat_letter);
            if name.is_empty() {
                continue;
            }
            if last_row.as_deref() != Some(row_label.as_str()) {
                x = 0.0;
                y += 1.0;
            } else {
                x += 1.0;
            }
            last_row = Some(row_label);
            for (column, target) in [("x", &mut x), ("y", &mut y)] {
                if let Some(value) = row.get(column).filter(|v| !v.is_empty()) {
                    *target = value.trim().parse::<f64>().map_err(|_| {
                        SeatingErrors::DataValidation("xy coordinates must be floats".to_string())
                    })?;
                }
            }
            let attributes: HashSet<String> = row
                .iter()
                .filter(|(k, v)| {
                    !matches!(k.as_str(), "row" | "seat" | "x" | "y")
                        && v.to_lowercase() == "true"
                })
                .map(|(k, _)| k.clone())
                .collect();
            seats.push(Seat {
                id: SeatId(self.next_seat + seats.len() as u32 + 1),
                room_id,
                name: Some(name),
                x,
                y,
                attributes,
                fixed: true,
            });
        }

        let names: HashSet<&str> = seats.iter().filter_map(|s| s.name.as_deref()).collect();
        if names.len() != seats.len() {
            return Err(SeatingErrors::DataValidation(
                "seats are not unique".to_string(),
            ));
        }
        let coords: HashSet<(u64, u64)> = seats
            .iter()
            .map(|s| (s.x.to_bits(), s.y.to_bits()))
            .collect();
        if coords.len() != seats.len() {
            return Err(SeatingErrors::DataValidation(
                "seat coordinates are not unique".to_string(),
            ));
        }

        // Nothing is committed until the whole sheet validates.
        self.next_room += 1;
        self.next_seat += seats.len() as u32;
        self.exam.rooms.push(Room {
            id: room_id,
            name: slug(display_name),
            display_name: display_name.to_string(),
            start_at: start_at.map(str::to_string),
            duration_minutes,
            seats,
        });
        Ok(room_id)
    }

    /// Adds a student with no preferences and no assignment.
    pub fn student(&mut self, canvas_id: &str, name: &str, email: &str) -> StudentId {
        self.next_student += 1;
        let id = StudentId(self.next_student);
        self.exam.students.push(Student {
            id,
            canvas_id: canvas_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            sid: None,
            wants: BTreeSet::new(),
            avoids: BTreeSet::new(),
            room_wants: BTreeSet::new(),
            room_avoids: BTreeSet::new(),
            assignment: None,
        });
        id
    }

    /// Replaces a student's four constraint sets. Attribute names are
    /// lower-cased on the way in, as the merge engine stores them.
    pub fn set_preferences(
        &mut self,
        student: StudentId,
        wants: &[&str],
        avoids: &[&str],
        room_wants: &[&str],
        room_avoids: &[&str],
    ) {
        fn to_set(items: &[&str]) -> BTreeSet<String> {
            items.iter().map(|s| s.to_lowercase()).collect()
        }
        if let Some(s) = self.exam.students.iter_mut().find(|s| s.id == student) {
            s.wants = to_set(wants);
            s.avoids = to_set(avoids);
            s.room_wants = to_set(room_wants);
            s.room_avoids = to_set(room_avoids);
        }
    }

    /// Records an existing assignment in the snapshot.
    pub fn assign(&mut self, student: StudentId, seat: SeatId, emailed: bool) {
        if let Some(s) = self.exam.students.iter_mut().find(|s| s.id == student) {
            s.assignment = Some(SeatAssignment {
                student_id: student,
                seat_id: seat,
                emailed,
            });
        }
    }

    pub fn build(self) -> Exam {
        self.exam
    }
}
