//! Ballot computation and submission gating for quadratic voting forms.
//!
//! A voter spends a fixed budget of credits over a slate of options: `n`
//! votes on one option cost `n²` credits. The crate holds the rules of a
//! single voting session:
//!
//! * [`ballot::Ballot`] the draft of selections, including an optional
//!   option proposed by the voter
//! * [`budget::BudgetPolicy`] the checks against the credit budget
//! * [`identity::IdentityGate`] email validation and duplicate detection
//! * [`store::BallotStore`] the operations required from the backing store
//! * [`submission::SubmissionController`] the submit transition
//!
//! ```
//! use quadratic_voting::store::SheetTable;
//! use quadratic_voting::submission::{SubmissionController, SubmitOutcome};
//! use quadratic_voting::{CreditBudget, OptionCatalog};
//!
//! let catalog = OptionCatalog::new(&["X".to_string(), "Y".to_string()]).unwrap();
//! let mut session = SubmissionController::new(&catalog, CreditBudget::DEFAULT, SheetTable::new());
//! session.set_email("a@b.com");
//! session.ballot_mut().set_intensity("X", 2).unwrap();
//! assert_eq!(session.remaining(), 5);
//! assert!(matches!(session.submit().unwrap(), SubmitOutcome::Success { .. }));
//! ```
mod config;

pub mod ballot;
pub mod budget;
pub mod identity;
pub mod manual;
pub mod store;
pub mod submission;

pub use crate::config::*;
