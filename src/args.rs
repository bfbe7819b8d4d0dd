use clap::Parser;

/// This is a seat assignment and roster import program for proctored exams.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (import or assign, default import) The operation to run: merge a roster file into the
    /// exam's student records, or give every unassigned student a seat.
    #[clap(short, long, value_parser)]
    pub mode: Option<String>,

    /// (file path) The JSON exam snapshot: rooms, seats, students and their current seat
    /// assignments. For more information about the file format, read the documentation of the
    /// exam_seating crate.
    #[clap(short, long, value_parser)]
    pub exam: String,

    /// (file path, optional) A JSON run configuration controling the import strategies and the
    /// assignment tie-break rules. Defaults apply when not provided.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The roster file to import. Required in import mode.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default csv) The type of the input: csv or xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default first sheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the run will be written in
    /// JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, seatplan will check that the
    /// produced summary matches the reference and fail on differences.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
