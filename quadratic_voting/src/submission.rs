use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use std::error::Error;
use std::fmt::Display;

use crate::ballot::Ballot;
use crate::budget::{BudgetGuidance, BudgetPolicy};
pub use crate::config::*;
use crate::identity::{
    decide_eligibility, is_valid_format, normalize, BlockReason, Eligibility, IdentityGate,
    VoterStatus,
};
use crate::store::{BallotStore, StoredBallotRow};

/// Where the session stands in the submit flow.
///
/// `Success` and `Rejected` report the last submit attempt. They are left
/// for the next mutation of the session (email, replace flag, ballot or a
/// new submit), which resumes `Editing`. After `Success` that session is a
/// fresh one; after `Rejected` the draft is kept and eligibility has been
/// refreshed from the store.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SubmissionState {
    Editing,
    Submitting,
    Success,
    Rejected,
}

/// Why the submit action is unavailable.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RejectReason {
    OverBudget,
    Blocked(BlockReason),
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::OverBudget => write!(f, "the ballot is over budget"),
            RejectReason::Blocked(reason) => write!(f, "{}", reason),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SubmitOutcome {
    Success {
        row: StoredBallotRow,
        status: VoterStatus,
        /// Number of earlier rows deleted for this identity.
        replaced_rows: usize,
    },
    /// Nothing was written to the store.
    Rejected(RejectReason),
}

/// The only failure that can happen after the submit action. The ballot is
/// left as it was, so the submission can be retried.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SubmitError {
    PersistenceFailure(StoreError),
}

impl Error for SubmitError {}

impl Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::PersistenceFailure(e) => write!(f, "could not save the ballot: {}", e),
        }
    }
}

impl From<StoreError> for SubmitError {
    fn from(e: StoreError) -> Self {
        SubmitError::PersistenceFailure(e)
    }
}

/// The submit-enabled predicate.
pub fn is_submit_enabled(
    over_budget: bool,
    valid_email: bool,
    is_duplicate: bool,
    replace_requested: bool,
) -> bool {
    !over_budget && decide_eligibility(valid_email, is_duplicate, replace_requested).is_allowed()
}

/// One voter session: the ballot draft, the identity, and the submit
/// transition against the store.
///
/// Derived values (cost, remaining credits, eligibility) are computed on
/// demand from the current draft. Only the duplicate lookup is memoized.
pub struct SubmissionController<S> {
    store: S,
    policy: BudgetPolicy,
    gate: IdentityGate,
    ballot: Ballot,
    email: String,
    replace_requested: bool,
    state: SubmissionState,
}

impl<S: BallotStore> SubmissionController<S> {
    pub fn new(catalog: &OptionCatalog, budget: CreditBudget, store: S) -> SubmissionController<S> {
        SubmissionController {
            store,
            policy: BudgetPolicy::new(budget),
            gate: IdentityGate::new(),
            ballot: Ballot::new(catalog),
            email: String::new(),
            replace_requested: false,
            state: SubmissionState::Editing,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    /// The normalized email.
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, raw_email: &str) {
        self.resume_editing();
        self.email = normalize(raw_email);
    }

    pub fn replace_requested(&self) -> bool {
        self.replace_requested
    }

    pub fn set_replace_requested(&mut self, replace: bool) {
        self.resume_editing();
        self.replace_requested = replace;
    }

    pub fn ballot(&self) -> &Ballot {
        &self.ballot
    }

    pub fn ballot_mut(&mut self) -> &mut Ballot {
        self.resume_editing();
        &mut self.ballot
    }

    pub fn total_cost(&self) -> u32 {
        self.ballot.total_cost()
    }

    pub fn remaining(&self) -> i64 {
        self.policy.remaining(self.total_cost())
    }

    pub fn budget_guidance(&self) -> BudgetGuidance {
        self.policy.guidance(self.total_cost())
    }

    pub fn is_duplicate(&mut self) -> Result<bool, SubmitError> {
        Ok(self.gate.is_duplicate(&self.email, &mut self.store)?)
    }

    pub fn voter_status(&mut self) -> Result<VoterStatus, SubmitError> {
        let dup = self.is_duplicate()?;
        Ok(VoterStatus::from_flags(dup, self.replace_requested))
    }

    pub fn eligibility(&mut self) -> Result<Eligibility, SubmitError> {
        let valid = is_valid_format(&self.email);
        let dup = self.is_duplicate()?;
        Ok(decide_eligibility(valid, dup, self.replace_requested))
    }

    /// Evaluates the submit predicate. The budget and the email format are
    /// checked before the store is consulted.
    pub fn check(&mut self) -> Result<Option<RejectReason>, SubmitError> {
        if !self.policy.is_valid(self.total_cost()) {
            return Ok(Some(RejectReason::OverBudget));
        }
        match self.eligibility()? {
            Eligibility::Allowed => Ok(None),
            Eligibility::Blocked(reason) => Ok(Some(RejectReason::Blocked(reason))),
        }
    }

    pub fn submit_enabled(&mut self) -> Result<bool, SubmitError> {
        Ok(self.check()?.is_none())
    }

    pub fn submit(&mut self) -> Result<SubmitOutcome, SubmitError> {
        self.submit_at(Utc::now())
    }

    /// Runs the submit transition with the given persistence time.
    pub fn submit_at(&mut self, now: DateTime<Utc>) -> Result<SubmitOutcome, SubmitError> {
        self.resume_editing();
        self.state = SubmissionState::Submitting;
        info!("submit: {:?} submitting, total cost {}", self.email, self.total_cost());

        // The predicate is recomputed from fresh store data.
        if self.policy.is_valid(self.total_cost()) && is_valid_format(&self.email) {
            self.gate.invalidate();
            self.store.invalidate_identity_cache();
        }
        let verdict = self.check();
        let status = match verdict {
            Err(e) => return Err(self.fail(e)),
            Ok(Some(reason)) => {
                warn!("submit: {:?} rejected: {}", self.email, reason);
                self.state = SubmissionState::Rejected;
                return Ok(SubmitOutcome::Rejected(reason));
            }
            Ok(None) => self.voter_status().map_err(|e| self.fail(e))?,
        };

        let mut replaced_rows = 0;
        if status == VoterStatus::DuplicateReplaceRequested {
            let handles = self
                .store
                .find_ballot_row_ids(&self.email)
                .map_err(|e| self.fail(e.into()))?;
            debug!("submit: deleting rows {:?} for {:?}", handles, self.email);
            self.store
                .delete_rows(&handles)
                .map_err(|e| self.fail(e.into()))?;
            replaced_rows = handles.len();
        }

        let row = StoredBallotRow::from_ballot(&self.email, &self.ballot, now);
        self.store
            .append_row(&row)
            .map_err(|e| self.fail(e.into()))?;

        self.store.invalidate_identity_cache();
        self.gate.invalidate();
        info!(
            "submit: {:?} recorded ({:?}, {} rows replaced)",
            self.email, status, replaced_rows
        );
        self.state = SubmissionState::Success;
        self.ballot.reset();
        self.email.clear();
        self.replace_requested = false;
        Ok(SubmitOutcome::Success {
            row,
            status,
            replaced_rows,
        })
    }

    fn fail(&mut self, e: SubmitError) -> SubmitError {
        warn!("submit: {:?} failed: {}", self.email, e);
        self.state = SubmissionState::Editing;
        e
    }

    fn resume_editing(&mut self) {
        if self.state != SubmissionState::Editing {
            debug!("resume_editing: {:?} -> Editing", self.state);
            self.state = SubmissionState::Editing;
        }
    }
}
