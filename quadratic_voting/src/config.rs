// ********* Input data structures ***********

use std::collections::HashSet;
use std::error::Error;
use std::fmt::Display;

/// The number of votes a voter puts on a single option.
///
/// A row of the ballot holds exactly one of these values. Casting `n` votes
/// costs `n²` credits.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Default)]
pub enum Intensity {
    #[default]
    Zero,
    One,
    Two,
    Three,
}

impl Intensity {
    pub const ALL: [Intensity; 4] = [
        Intensity::Zero,
        Intensity::One,
        Intensity::Two,
        Intensity::Three,
    ];

    pub fn votes(self) -> u32 {
        match self {
            Intensity::Zero => 0,
            Intensity::One => 1,
            Intensity::Two => 2,
            Intensity::Three => 3,
        }
    }

    /// The quadratic cost of this intensity, in credits.
    pub fn cost(self) -> u32 {
        self.votes() * self.votes()
    }
}

impl TryFrom<u32> for Intensity {
    type Error = BallotError;

    fn try_from(votes: u32) -> Result<Self, Self::Error> {
        match votes {
            0 => Ok(Intensity::Zero),
            1 => Ok(Intensity::One),
            2 => Ok(Intensity::Two),
            3 => Ok(Intensity::Three),
            x => Err(BallotError::InvalidIntensity(x)),
        }
    }
}

impl Display for Intensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.votes())
    }
}

/// The default slate of the form.
pub const DEFAULT_OPTIONS: [&str; 12] = [
    "How Did We Get Here?",
    "How In The World?",
    "I Made This For You",
    "If You Make It, They Will Come",
    "Made Possible By",
    "Make It Possible",
    "Rise and Hypothesize",
    "Rise and Realize",
    "Rise and Scrutinize",
    "Rise and Theorize",
    "What In The World?",
    "Your Passions Made Possible By",
];

/// The fixed, ordered list of options a voter can spend credits on.
///
/// Invariant: non-empty, no duplicate or blank names, and no name equal to
/// one of the [`RESERVED_COLUMNS`] of the responses sheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OptionCatalog {
    names: Vec<String>,
}

impl OptionCatalog {
    pub fn new(names: &[String]) -> Result<OptionCatalog, BallotError> {
        if names.is_empty() {
            return Err(BallotError::EmptyCatalog);
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for name in names.iter() {
            if name.trim().is_empty() {
                return Err(BallotError::BlankOption);
            }
            if RESERVED_COLUMNS.contains(&name.as_str()) {
                return Err(BallotError::ReservedOption(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(BallotError::DuplicateOption(name.clone()));
            }
        }
        Ok(OptionCatalog {
            names: names.to_vec(),
        })
    }

    pub fn default_slate() -> OptionCatalog {
        OptionCatalog {
            names: DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Total spendable credits per ballot.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CreditBudget(pub u32);

impl CreditBudget {
    pub const DEFAULT: CreditBudget = CreditBudget(9);
}

impl Default for CreditBudget {
    fn default() -> Self {
        CreditBudget::DEFAULT
    }
}

// ********* Persisted columns **********

pub const TIMESTAMP_COLUMN: &str = "timestamp_utc";
pub const EMAIL_COLUMN: &str = "email";
pub const TOTAL_COST_COLUMN: &str = "total_cost";
pub const PROPOSED_TEXT_COLUMN: &str = "Other (text)";
pub const PROPOSED_VOTES_COLUMN: &str = "Other (votes)";

/// Columns of the responses sheet that are not catalog options.
pub const RESERVED_COLUMNS: [&str; 5] = [
    TIMESTAMP_COLUMN,
    EMAIL_COLUMN,
    TOTAL_COST_COLUMN,
    PROPOSED_TEXT_COLUMN,
    PROPOSED_VOTES_COLUMN,
];

// ******** Errors *********

/// Contract violations when building or editing a ballot.
///
/// These are never clamped or ignored: the offending mutation is rejected.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum BallotError {
    /// The number of votes is outside of 0..=3.
    InvalidIntensity(u32),
    /// The option is neither in the catalog nor the current proposed option.
    UnknownOption(String),
    EmptyCatalog,
    DuplicateOption(String),
    /// A catalog name is empty or only whitespace.
    BlankOption,
    /// A catalog name collides with a bookkeeping column of the sheet.
    ReservedOption(String),
}

impl Error for BallotError {}

impl Display for BallotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BallotError::InvalidIntensity(x) => {
                write!(f, "invalid intensity {}: expected 0, 1, 2 or 3", x)
            }
            BallotError::UnknownOption(name) => write!(f, "unknown option {:?}", name),
            BallotError::EmptyCatalog => write!(f, "the option catalog is empty"),
            BallotError::DuplicateOption(name) => {
                write!(f, "option {:?} appears more than once in the catalog", name)
            }
            BallotError::BlankOption => write!(f, "the option catalog has a blank name"),
            BallotError::ReservedOption(name) => {
                write!(f, "option {:?} is a reserved column of the sheet", name)
            }
        }
    }
}

/// Failures of the backing store. The message comes from the store
/// implementation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StoreError {
    PersistenceFailure(String),
}

impl Error for StoreError {}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::PersistenceFailure(msg) => write!(f, "persistence failure: {}", msg),
        }
    }
}
