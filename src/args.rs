use clap::Parser;

/// This is a quadratic voting form: it records one ballot per email in a responses sheet.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the form: the options, the budget and the store.
    /// Without it, the built-in list of options and a budget of 9 credits are used.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, optional) The CSV file holding the responses sheet. Setting this option overrides
    /// the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub store: Option<String>,

    /// The email of the voter. It is the identity used to detect an earlier ballot.
    #[clap(short, long, value_parser)]
    pub email: Option<String>,

    /// (repeated, NAME=VOTES) The number of votes, between 0 and 3, for an option. Each vote
    /// costs its square in credits.
    #[clap(short, long, value_parser)]
    pub vote: Vec<String>,

    /// (optional) The name of an option that is not on the list. It starts with 0 votes.
    #[clap(long, value_parser)]
    pub propose: Option<String>,

    /// (optional, 0 to 3) The number of votes for the proposed option.
    #[clap(long, value_parser)]
    pub propose_votes: Option<u32>,

    /// If passed as an argument, the previous ballot recorded for this email is replaced.
    #[clap(long, takes_value = false)]
    pub replace: bool,

    /// If passed as an argument, prints the state of the ballot without recording it.
    #[clap(long, takes_value = false)]
    pub dry_run: bool,

    /// (file path, optional) An Excel export of the responses sheet. Its content replaces the
    /// content of the store before anything else happens.
    #[clap(long, value_parser)]
    pub import_xlsx: Option<String>,

    /// (default Responses) When importing an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
