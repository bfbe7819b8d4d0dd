// Primitives for reading CSV roster files.

use std::collections::{HashMap, HashSet};

use csv::ReaderBuilder;
use log::debug;
use snafu::prelude::*;

use crate::seating::{io_common, CsvLineParseSnafu, OpeningCsvSnafu, SeatplanResult};

/// Reads a roster CSV: the first line names the columns, every following
/// line is one student row.
pub fn read_csv_roster(
    path: &str,
) -> SeatplanResult<(HashSet<String>, Vec<HashMap<String, String>>)> {
    let rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    let mut records = rdr.into_records();

    let header_record = match records.next() {
        Some(r) => r.context(CsvLineParseSnafu { lineno: 1usize })?,
        None => whatever!("Roster file {} is empty", path),
    };
    let header_cells: Vec<String> = header_record.iter().map(|c| c.to_string()).collect();
    let headers = io_common::normalize_headers(&header_cells);
    debug!("read_csv_roster: headers: {:?}", headers);

    let mut data: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header occupies line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        debug!("{:?} {:?}", lineno, line);
        data.push(line.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(io_common::rows_to_maps(&headers, data))
}
