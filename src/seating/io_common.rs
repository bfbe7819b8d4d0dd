use std::collections::{HashMap, HashSet};

/// Lower-cases and trims a header row. Column names are matched
/// case-insensitively everywhere downstream.
pub fn normalize_headers(cells: &[String]) -> Vec<String> {
    cells.iter().map(|c| c.trim().to_lowercase()).collect()
}

/// Zips a header row and data rows into the `(headers, rows)` shape the
/// roster merge engine accepts. Cells under an empty header are dropped;
/// short rows simply lack the trailing keys.
pub fn rows_to_maps(
    headers: &[String],
    data: Vec<Vec<String>>,
) -> (HashSet<String>, Vec<HashMap<String, String>>) {
    let header_set: HashSet<String> = headers.iter().filter(|h| !h.is_empty()).cloned().collect();
    let rows: Vec<HashMap<String, String>> = data
        .into_iter()
        .map(|cells| {
            headers
                .iter()
                .zip(cells.into_iter())
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, v)| (h.clone(), v))
                .collect()
        })
        .collect();
    (header_set, rows)
}
