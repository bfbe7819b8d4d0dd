/*!

# Quick start

This example runs a small exam end to end: import a roster, then assign
seats.

**The exam snapshot** Describe the rooms and seats of the exam in a JSON
file (`exam.json`). A fresh exam has no students yet:

```json
{
    "examId": 1,
    "name": "cs70-final",
    "rooms": [
        {
            "id": 1,
            "displayName": "Soda 306",
            "seats": [
                {"id": 1, "name": "A1", "x": 0, "y": 0, "fixed": true, "attributes": ["lefty", "aisle"]},
                {"id": 2, "name": "A2", "x": 1, "y": 0, "fixed": true},
                {"id": 3, "name": "A3", "x": 2, "y": 0, "fixed": true}
            ]
        }
    ],
    "students": []
}
```

**The roster** Export your roster as CSV. Any column that is not one of the
recognized ones becomes a preference flag:

```text
canvas id,name,email,lefty
123456,John Doe,john@example.com,true
123457,Ada Lovelace,ada@example.com,
123458,Grace Hopper,grace@example.com,false
```

**Importing** Merge the roster into the snapshot:

```bash
seatplan --mode import --exam exam.json --input roster.csv
```

The summary lists three new students; John wants a left-handed seat and
Grace refuses one. Persist them into `exam.json` with your own tooling (the
program never writes the snapshot back), then assign:

```bash
seatplan --mode assign --exam exam.json
```

The summary pairs each student with a seat, most constrained students
first, so John gets `A1` before anyone else can take it. To make the chart
reproducible, pass a configuration with a fixed random seed (see the
[manual](../manual/index.html#configuration)):

```bash
seatplan --mode assign --exam exam.json --config rules.json --out chart.json
```

Re-running with the same seed yields the same chart; `--reference` compares
a fresh run against a stored summary and fails on any difference.

*/
