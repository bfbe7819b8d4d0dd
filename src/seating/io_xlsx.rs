// Primitives for reading Excel roster files.

use std::collections::{HashMap, HashSet};

use calamine::{open_workbook, Reader, Xlsx};
use log::debug;
use snafu::prelude::*;

use crate::seating::{io_common, EmptyExcelSnafu, OpeningExcelSnafu, SeatplanResult};

/// Reads a roster out of an Excel workbook. The worksheet defaults to the
/// first one; the first row names the columns.
pub fn read_xlsx_roster(
    path: &str,
    worksheet: Option<&str>,
) -> SeatplanResult<(HashSet<String>, Vec<HashMap<String, String>>)> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut iter = wrange.rows();
    let header = match iter.next() {
        Some(r) => r,
        None => whatever!("Missing header row in {}", path),
    };
    debug!("header: {:?}", header);
    let mut header_cells: Vec<String> = Vec::new();
    for elt in header {
        header_cells.push(read_cell(elt)?);
    }
    let headers = io_common::normalize_headers(&header_cells);

    let mut data: Vec<Vec<String>> = Vec::new();
    for row in iter {
        debug!("workbook: {:?}", row);
        let mut cells: Vec<String> = Vec::new();
        for elt in row {
            cells.push(read_cell(elt)?);
        }
        data.push(cells);
    }
    Ok(io_common::rows_to_maps(&headers, data))
}

fn read_cell(cell: &calamine::DataType) -> SeatplanResult<String> {
    match cell {
        calamine::DataType::String(s) => Ok(s.trim().to_string()),
        // Seat and canvas ids come back as numeric cells; render whole
        // numbers without the trailing ".0".
        calamine::DataType::Float(f) if f.fract() == 0.0 => Ok(format!("{}", *f as i64)),
        calamine::DataType::Float(f) => Ok(f.to_string()),
        calamine::DataType::Int(i) => Ok(i.to_string()),
        calamine::DataType::Bool(b) => Ok(b.to_string()),
        calamine::DataType::Empty => Ok("".to_string()),
        _ => whatever!("read_cell: could not understand cell {:?}", cell),
    }
}
