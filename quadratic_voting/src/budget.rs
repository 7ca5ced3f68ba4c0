use std::fmt::Display;

pub use crate::config::*;

/// Advice shown next to the credit counters.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum BudgetGuidance {
    /// Blocks the submission.
    OverBudget { budget: u32 },
    /// Encouragement only, the ballot can still be submitted.
    CreditsLeft { remaining: u32 },
    FullySpent,
}

impl BudgetGuidance {
    pub fn is_blocking(&self) -> bool {
        matches!(self, BudgetGuidance::OverBudget { .. })
    }
}

impl Display for BudgetGuidance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetGuidance::OverBudget { budget } => write!(
                f,
                "Over budget — uncheck something until you're at {} credits or less.",
                budget
            ),
            BudgetGuidance::CreditsLeft { remaining } => write!(
                f,
                "You have {} credit{} left. While you don't have to spend all your credits, it is encouraged.",
                remaining,
                if *remaining != 1 { "s" } else { "" }
            ),
            BudgetGuidance::FullySpent => write!(f, "All credits spent."),
        }
    }
}

/// Arithmetic and predicates over the total cost of a ballot.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct BudgetPolicy {
    pub budget: CreditBudget,
}

impl BudgetPolicy {
    pub fn new(budget: CreditBudget) -> BudgetPolicy {
        BudgetPolicy { budget }
    }

    /// May be negative when over budget.
    pub fn remaining(&self, total_cost: u32) -> i64 {
        self.budget.0 as i64 - total_cost as i64
    }

    pub fn is_over_budget(&self, total_cost: u32) -> bool {
        total_cost > self.budget.0
    }

    /// Spending nothing is valid.
    pub fn is_valid(&self, total_cost: u32) -> bool {
        !self.is_over_budget(total_cost)
    }

    pub fn guidance(&self, total_cost: u32) -> BudgetGuidance {
        let remaining = self.remaining(total_cost);
        if remaining < 0 {
            BudgetGuidance::OverBudget {
                budget: self.budget.0,
            }
        } else if remaining > 0 {
            BudgetGuidance::CreditsLeft {
                remaining: remaining as u32,
            }
        } else {
            BudgetGuidance::FullySpent
        }
    }
}
