use log::debug;
use regex::Regex;

use std::fmt::Display;
use std::sync::OnceLock;

use crate::store::BallotStore;
pub use crate::config::*;

/// Trims and lower-cases an email.
pub fn normalize(raw_email: &str) -> String {
    raw_email.trim().to_lowercase()
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|e| panic!("email pattern: {}", e))
    })
}

/// `local@domain.tld`, no whitespace anywhere. Never fails: malformed input
/// is simply not valid.
pub fn is_valid_format(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// Exact match of the normalized email against the stored identities.
pub fn check_duplicate<S: BallotStore>(email: &str, store: &mut S) -> Result<bool, StoreError> {
    let ids = store.known_identities()?;
    Ok(ids.contains(&normalize(email)))
}

/// Why a submission is not allowed for this identity.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum BlockReason {
    InvalidEmail,
    /// The email already voted and the voter did not ask to replace.
    DuplicateNotConfirmed,
}

impl Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::InvalidEmail => {
                write!(f, "Please enter a valid email address (e.g., name@example.com).")
            }
            BlockReason::DuplicateNotConfirmed => write!(
                f,
                "We already have a vote from this email. You can replace it below."
            ),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Eligibility {
    Allowed,
    Blocked(BlockReason),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        *self == Eligibility::Allowed
    }
}

/// Where the voter stands with respect to earlier ballots.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VoterStatus {
    NewVoter,
    DuplicateBlocked,
    DuplicateReplaceRequested,
}

impl VoterStatus {
    pub fn from_flags(is_duplicate: bool, replace_requested: bool) -> VoterStatus {
        match (is_duplicate, replace_requested) {
            (false, _) => VoterStatus::NewVoter,
            (true, false) => VoterStatus::DuplicateBlocked,
            (true, true) => VoterStatus::DuplicateReplaceRequested,
        }
    }
}

pub fn decide_eligibility(
    is_valid_format: bool,
    is_duplicate: bool,
    replace_requested: bool,
) -> Eligibility {
    if !is_valid_format {
        Eligibility::Blocked(BlockReason::InvalidEmail)
    } else if is_duplicate && !replace_requested {
        Eligibility::Blocked(BlockReason::DuplicateNotConfirmed)
    } else {
        Eligibility::Allowed
    }
}

/// Duplicate lookups for one session, memoized on the last email checked.
///
/// The store is queried again only when the email changes or after
/// [`IdentityGate::invalidate`].
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct IdentityGate {
    last_checked: Option<(String, bool)>,
}

impl IdentityGate {
    pub fn new() -> IdentityGate {
        IdentityGate::default()
    }

    /// Whether this email already has a stored ballot. Emails with an
    /// invalid format are never looked up.
    pub fn is_duplicate<S: BallotStore>(
        &mut self,
        email: &str,
        store: &mut S,
    ) -> Result<bool, StoreError> {
        let email = normalize(email);
        if !is_valid_format(&email) {
            return Ok(false);
        }
        if let Some((last, exists)) = &self.last_checked {
            if *last == email {
                return Ok(*exists);
            }
        }
        debug!("is_duplicate: looking up {:?}", email);
        let exists = check_duplicate(&email, store)?;
        self.last_checked = Some((email, exists));
        Ok(exists)
    }

    pub fn invalidate(&mut self) {
        self.last_checked = None;
    }
}
