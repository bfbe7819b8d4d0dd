/*!

This is the long-form manual for `exam_seating` and `seatplan`.

## The two engines

`exam_seating` ships two batch engines over one preference model:

* [`assign_students`](crate::assign_students) maps every unassigned student
  of an exam to an unassigned seat, always serving the most constrained
  preference group first. It either returns one assignment per student or
  fails with [`SeatingErrors::NotEnoughSeats`](crate::SeatingErrors) naming
  the blocked group; it never returns a partial seating chart.
* [`prepare_students`](crate::prepare_students) merges roster rows into the
  exam's student records under six independent policies
  ([`StudentImportConfig`](crate::StudentImportConfig)) and returns the new,
  updated and invalid rows plus the ids queued for deletion.

Neither engine performs I/O. The caller hydrates an
[`Exam`](crate::Exam) snapshot, invokes an engine, and persists the returned
values. `seatplan` is one such caller.

## Roster row format

A roster is a table. The first row holds column names; names are compared
lower-cased. Three columns are required:

| column | meaning |
|--------------|--------------------------------------------|
| `canvas id` (or `bcourses id`) | external student identity, unique per exam |
| `name` | student display name |
| `email` | student contact address |

Recognized optional columns: `student id` (secondary id), `emailed`
(`true`/`false`, recorded on a row-supplied assignment), `seat id` or
`assignment` (directly referenced seat), `room name` or `session name`
plus `seat name` (seat referenced by its labels), `public seat url`
(ignored on import).

Every other column is a preference flag. A cell of `true` adds the column
name to the student's `wants`; `false` adds it to `avoids`; anything else is
skipped. Columns named `room:<id>` constrain rooms instead of attributes:

```text
canvas id,name,email,lefty,room:2
123456,John Doe,john@example.com,true,false
```

John wants a left-handed seat and refuses room 2.

## Import strategies

Six policies control what a row may change, one per kind of change. The
defaults are listed first.

* `assignmentImportStrategy`: `revalidate` (row seat accepted if free and
  eligible), `force` (accepted if merely free), `ignore`.
* `updatedStudentInfoImportStrategy`: `merge` (blank row cells fall back to
  stored values), `overwrite`, `ignore`.
* `updatedPreferenceImportStrategy`: `overwrite`, `merge` (union with the
  stored sets), `ignore`.
* `newStudentImportStrategy`: `append`, `ignore` (unseen canvas ids become
  invalid rows).
* `missingStudentImportStrategy`: `ignore`, `delete` (students absent from
  the batch are queued for deletion).
* `revalidateExistingAssignments`: `true` (an existing assignment is cleared
  when the updated preference no longer allows its seat), `false`.

New students always take the row values, whatever the update strategies say.

## Configuration

`seatplan` accepts a JSON run configuration with the policies above plus the
assignment tie-break rules:

```json
{
    "importRules": {
        "updatedPreferenceImportStrategy": "merge",
        "missingStudentImportStrategy": "delete"
    },
    "assignRules": {
        "tiebreakMode": "random",
        "randomSeed": "42"
    }
}
```

`tiebreakMode` is `inputOrder` (first in input order) or `random`. The
random mode requires `randomSeed` and is deterministic for a fixed seed, so
a published seating chart can be reproduced after the fact.

## Exam snapshot format

The exam file is a JSON document with the rooms, seats and students of one
exam, including current assignments:

```json
{
    "examId": 1,
    "name": "cs70-final",
    "rooms": [
        {
            "id": 1,
            "displayName": "Soda 306",
            "startAt": "2026-05-10T08:00",
            "durationMinutes": 110,
            "seats": [
                {"id": 1, "name": "A1", "x": 0, "y": 0, "fixed": true, "attributes": ["lefty"]},
                {"id": 2, "x": 1, "y": 0, "fixed": false}
            ]
        }
    ],
    "students": [
        {
            "id": 1,
            "canvasId": "123456",
            "name": "John Doe",
            "email": "john@example.com",
            "wants": ["lefty"],
            "assignment": {"seatId": 1, "emailed": false}
        }
    ]
}
```

A seat without a `name` is a movable seat. Unset lists default to empty.

## Input formats

The following roster formats are supported:
* `csv` Comma Separated Values, first line holding the column names.
* `xlsx` Excel workbooks. The worksheet is picked with
  `--excel-worksheet-name`, defaulting to the first sheet.

Roster exports from Canvas-style course systems work unchanged: their
`canvas id`/`bcourses id`, `name` and `email` columns are exactly the
required ones.

*/
