use log::{debug, info, warn};

use quadratic_voting::budget::BudgetGuidance;
use quadratic_voting::identity::{is_valid_format, BlockReason, VoterStatus};
use quadratic_voting::store::{BallotStore, CachedIdentities, DEFAULT_IDENTITY_TTL};
use quadratic_voting::submission::{SubmissionController, SubmitError, SubmitOutcome};
use quadratic_voting::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::args::Args;
use crate::qv::config_reader::*;
use crate::qv::io_csv::CsvSheetStore;

pub mod config_reader;
pub mod io_csv;
pub mod io_xlsx;

#[derive(Debug, Snafu)]
pub enum QvError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Missing worksheet {name} in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Unexpected cell at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the configuration"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error reading the sheet {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error writing the sheet {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error accessing the sheet {path}"))]
    StoreIo {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("Invalid list of options: {source}"))]
    Catalog { source: BallotError },
    #[snafu(display("Invalid vote {vote:?}: {source}"))]
    InvalidVote { source: BallotError, vote: String },
    #[snafu(display("Could not understand vote {vote:?}, expected NAME=VOTES"))]
    VoteSyntax { vote: String },
    #[snafu(display("{source}"))]
    Submit { source: SubmitError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type QvResult<T> = Result<T, QvError>;

/// Splits `NAME=VOTES`. The name may itself contain `=`.
fn parse_vote(vote: &str) -> QvResult<(String, u32)> {
    let (name, votes) = vote.rsplit_once('=').context(VoteSyntaxSnafu { vote })?;
    let votes = votes
        .trim()
        .parse::<u32>()
        .ok()
        .context(VoteSyntaxSnafu { vote })?;
    Ok((name.trim().to_string(), votes))
}

/// Fills the ballot draft of the session from the command line.
fn fill_ballot<S: BallotStore>(
    session: &mut SubmissionController<S>,
    args: &Args,
) -> QvResult<()> {
    session.set_email(args.email.as_deref().unwrap_or(""));
    session.set_replace_requested(args.replace);
    if let Some(name) = &args.propose {
        session.ballot_mut().propose_option(name);
    }
    if let Some(votes) = args.propose_votes {
        session
            .ballot_mut()
            .set_proposed_intensity(votes)
            .context(InvalidVoteSnafu {
                vote: format!("{:?}={}", args.propose.clone().unwrap_or_default(), votes),
            })?;
    }
    for vote in args.vote.iter() {
        let (name, votes) = parse_vote(vote)?;
        session
            .ballot_mut()
            .set_intensity(&name, votes)
            .context(InvalidVoteSnafu {
                vote: vote.clone(),
            })?;
    }
    debug!("fill_ballot: {:?}", session.ballot());
    Ok(())
}

/// The messages the form shows next to the ballot.
fn guidance_messages<S: BallotStore>(
    session: &mut SubmissionController<S>,
) -> QvResult<Vec<String>> {
    let mut messages: Vec<String> = Vec::new();
    let email = session.email().to_string();
    if !email.is_empty() && !is_valid_format(&email) {
        messages.push(BlockReason::InvalidEmail.to_string());
    }
    if session.voter_status().context(SubmitSnafu {})? == VoterStatus::DuplicateBlocked {
        messages.push(BlockReason::DuplicateNotConfirmed.to_string());
    }
    match session.budget_guidance() {
        BudgetGuidance::FullySpent => {}
        g => messages.push(g.to_string()),
    }
    Ok(messages)
}

fn build_summary_js<S: BallotStore>(
    session: &mut SubmissionController<S>,
    title: &str,
) -> QvResult<JSValue> {
    let mut votes: JSMap<String, JSValue> = JSMap::new();
    for (name, intensity) in session.ballot().selections() {
        votes.insert(name.to_string(), json!(intensity.votes()));
    }
    let proposed = session
        .ballot()
        .proposed()
        .map(|p| json!({"name": p.name, "votes": p.intensity.votes()}));
    let status = if is_valid_format(session.email()) {
        Some(format!("{:?}", session.voter_status().context(SubmitSnafu {})?))
    } else {
        None
    };
    let messages = guidance_messages(session)?;
    let submit_enabled = session.submit_enabled().context(SubmitSnafu {})?;
    Ok(json!({
        "form": title,
        "email": session.email(),
        "voterStatus": status,
        "totalCost": session.total_cost(),
        "remaining": session.remaining(),
        "votes": votes,
        "proposed": proposed,
        "submitEnabled": submit_enabled,
        "messages": messages,
    }))
}

fn print_js(js: &JSValue) -> QvResult<()> {
    let pretty = serde_json::to_string_pretty(js).context(ParsingJsonSnafu {})?;
    println!("{}", pretty);
    Ok(())
}

/// Loads the configuration, then applies the command line on top of it.
fn load_config(args: &Args) -> QvResult<QvConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => QvConfig::builtin(),
    };
    if let Some(store_path) = &args.store {
        config.store.file_path = store_path.clone();
    }
    if config.store.provider != "csv" {
        whatever!("Store provider not implemented: {:?}", config.store.provider)
    }
    info!("config: {:?}", config);
    Ok(config)
}

/// Fills one ballot from the command line and submits it, unless this is a
/// dry run. The summary is printed in both cases.
pub fn run_form(args: &Args) -> QvResult<()> {
    let config = load_config(args)?;
    let store_path = config.store.file_path.clone();

    if let Some(xlsx_path) = &args.import_xlsx {
        let worksheet = args
            .excel_worksheet_name
            .clone()
            .or_else(|| config.store.worksheet_name.clone());
        let sheet = io_xlsx::read_xlsx_sheet(xlsx_path, worksheet.as_deref())?;
        io_csv::write_sheet(&store_path, &sheet)?;
        info!(
            "Imported {} rows from {:?} into {:?}",
            sheet.rows().len(),
            xlsx_path,
            store_path
        );
        if args.email.is_none() {
            return Ok(());
        }
    }

    let catalog = config.catalog()?;
    let store = CachedIdentities::new(
        CsvSheetStore::open(&store_path)?,
        config.identity_cache_ttl(),
    );
    let mut session = SubmissionController::new(&catalog, config.budget(), store);
    fill_ballot(&mut session, args)?;

    let title = config
        .form_settings
        .form_title
        .clone()
        .unwrap_or_else(|| config.worksheet_name());
    let mut summary = build_summary_js(&mut session, &title)?;

    if args.dry_run {
        summary["outcome"] = json!("dryRun");
        return print_js(&summary);
    }

    let outcome = session.submit().context(SubmitSnafu {})?;
    match outcome {
        SubmitOutcome::Success {
            row,
            status,
            replaced_rows,
        } => {
            summary["outcome"] = json!("recorded");
            summary["voterStatus"] = json!(format!("{:?}", status));
            summary["replacedRows"] = json!(replaced_rows);
            summary["timestampUtc"] = json!(row.get(TIMESTAMP_COLUMN));
            print_js(&summary)?;
            println!("Thanks! Your vote was recorded.");
            Ok(())
        }
        SubmitOutcome::Rejected(reason) => {
            summary["outcome"] = json!("rejected");
            print_js(&summary)?;
            warn!("Submission rejected: {}", reason);
            whatever!("Submission rejected: {}", reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use quadratic_voting::store::SheetTable;

    fn args(extra: &[&str], store: &Path) -> Args {
        let mut all = vec!["qvote", "--store", store.to_str().unwrap()];
        all.extend_from_slice(extra);
        Args::parse_from(all)
    }

    fn sheet(store: &Path) -> SheetTable {
        CsvSheetStore::open(store.to_str().unwrap())
            .unwrap()
            .load()
            .unwrap()
    }

    #[test]
    fn parse_votes() {
        assert_eq!(
            parse_vote("Make It Possible = 2").unwrap(),
            ("Make It Possible".to_string(), 2)
        );
        assert_eq!(parse_vote("a=b=1").unwrap(), ("a=b".to_string(), 1));
        assert!(matches!(
            parse_vote("no votes"),
            Err(QvError::VoteSyntax { .. })
        ));
        assert!(matches!(
            parse_vote("X=two"),
            Err(QvError::VoteSyntax { .. })
        ));
    }

    #[test]
    fn submit_then_replace() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("responses.csv");

        let first = args(
            &[
                "--email",
                "A@B.com",
                "--vote",
                "Make It Possible=2",
                "--vote",
                "Rise and Realize=1",
            ],
            &store,
        );
        run_form(&first).unwrap();
        let s = sheet(&store);
        assert_eq!(s.rows().len(), 1);
        assert_eq!(s.header().len(), 3 + 12 + 2);
        assert_eq!(s.column_values("email"), vec!["a@b.com"]);
        assert_eq!(s.column_values("total_cost"), vec!["5"]);

        // Without --replace the second ballot is refused.
        let again = args(&["--email", "a@b.com", "--vote", "Make It Possible=3"], &store);
        assert!(run_form(&again).is_err());
        assert_eq!(sheet(&store).rows().len(), 1);

        let replace = args(
            &[
                "--email",
                "a@b.com",
                "--vote",
                "Make It Possible=3",
                "--replace",
            ],
            &store,
        );
        run_form(&replace).unwrap();
        let s = sheet(&store);
        assert_eq!(s.rows().len(), 1);
        assert_eq!(s.column_values("Make It Possible"), vec!["3"]);
        assert_eq!(s.column_values("Rise and Realize"), vec!["0"]);
        assert_eq!(s.column_values("total_cost"), vec!["9"]);
    }

    #[test]
    fn proposal_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("responses.csv");
        let a = args(
            &[
                "--email",
                "c@d.org",
                "--propose",
                "  Brand New  ",
                "--propose-votes",
                "2",
            ],
            &store,
        );
        run_form(&a).unwrap();
        let s = sheet(&store);
        assert_eq!(s.column_values("Other (text)"), vec!["Brand New"]);
        assert_eq!(s.column_values("Other (votes)"), vec!["2"]);
        assert_eq!(s.column_values("total_cost"), vec!["4"]);
    }

    #[test]
    fn over_budget_and_dry_run_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("responses.csv");
        let over = args(
            &[
                "--email",
                "a@b.com",
                "--vote",
                "Make It Possible=3",
                "--vote",
                "Rise and Realize=3",
                "--vote",
                "Rise and Theorize=3",
            ],
            &store,
        );
        assert!(run_form(&over).is_err());
        let dry = args(&["--email", "a@b.com", "--dry-run"], &store);
        run_form(&dry).unwrap();
        assert!(sheet(&store).rows().is_empty());
    }

    #[test]
    fn bad_votes_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("responses.csv");
        let unknown = args(&["--email", "a@b.com", "--vote", "Nope=1"], &store);
        assert!(matches!(
            run_form(&unknown),
            Err(QvError::InvalidVote { .. })
        ));
        let too_many = args(&["--email", "a@b.com", "--vote", "Make It Possible=4"], &store);
        assert!(matches!(
            run_form(&too_many),
            Err(QvError::InvalidVote { .. })
        ));
    }

    #[test]
    fn messages_for_the_form() {
        let mut session = SubmissionController::new(
            &OptionCatalog::default_slate(),
            CreditBudget::DEFAULT,
            SheetTable::new(),
        );
        session.set_email("not an email");
        session
            .ballot_mut()
            .set_intensity("Make It Possible", 2)
            .unwrap();
        let messages = guidance_messages(&mut session).unwrap();
        assert_eq!(
            messages,
            vec![
                "Please enter a valid email address (e.g., name@example.com).".to_string(),
                "You have 5 credits left. While you don't have to spend all your credits, it is encouraged.".to_string(),
            ]
        );
        session.set_email("");
        session
            .ballot_mut()
            .set_intensity("Make It Possible", 3)
            .unwrap();
        assert!(guidance_messages(&mut session).unwrap().is_empty());
    }
}
