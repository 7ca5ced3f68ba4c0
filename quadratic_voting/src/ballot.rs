use log::debug;

pub use crate::config::*;

/// The proposed option row. It is correlated to the text the voter typed,
/// not to a stable identity: changing the text creates a new row.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProposedOption {
    pub name: String,
    pub intensity: Intensity,
}

/// One voter's selections over the catalog, plus an optional proposed option.
///
/// Every row holds a single [`Intensity`], so a row can never carry two
/// selections at once. The total cost is always recomputed from the rows.
///
/// ```
/// use quadratic_voting::ballot::Ballot;
/// use quadratic_voting::OptionCatalog;
/// # use quadratic_voting::BallotError;
///
/// let catalog = OptionCatalog::new(&["X".to_string(), "Y".to_string()])?;
/// let mut ballot = Ballot::new(&catalog);
/// ballot.set_intensity("X", 2)?;
/// ballot.set_intensity("Y", 1)?;
/// assert_eq!(ballot.total_cost(), 5);
///
/// # Ok::<(), BallotError>(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub(crate) catalog: OptionCatalog,
    // Same order as the catalog.
    pub(crate) rows: Vec<Intensity>,
    pub(crate) proposed: Option<ProposedOption>,
}

impl Ballot {
    pub fn new(catalog: &OptionCatalog) -> Ballot {
        Ballot {
            catalog: catalog.clone(),
            rows: vec![Intensity::Zero; catalog.len()],
            proposed: None,
        }
    }

    pub fn catalog(&self) -> &OptionCatalog {
        &self.catalog
    }

    /// Sets the number of votes for an option, overwriting the previous value.
    ///
    /// Catalog names take precedence over the proposed option when both
    /// carry the same text.
    pub fn set_intensity(&mut self, option: &str, votes: u32) -> Result<(), BallotError> {
        let intensity = Intensity::try_from(votes)?;
        if let Some(idx) = self.catalog.position(option) {
            self.rows[idx] = intensity;
        } else {
            match self.proposed.as_mut() {
                Some(p) if p.name == option => {
                    p.intensity = intensity;
                }
                _ => return Err(BallotError::UnknownOption(option.to_string())),
            }
        }
        debug!("set_intensity: {:?} -> {:?}", option, intensity);
        Ok(())
    }

    /// Sets the votes of the proposed option row, whatever its text.
    pub fn set_proposed_intensity(&mut self, votes: u32) -> Result<(), BallotError> {
        let intensity = Intensity::try_from(votes)?;
        match self.proposed.as_mut() {
            Some(p) => {
                p.intensity = intensity;
                Ok(())
            }
            None => Err(BallotError::UnknownOption("".to_string())),
        }
    }

    pub fn intensity(&self, option: &str) -> Option<Intensity> {
        if let Some(idx) = self.catalog.position(option) {
            return Some(self.rows[idx]);
        }
        self.proposed
            .as_ref()
            .filter(|p| p.name == option)
            .map(|p| p.intensity)
    }

    /// Proposes a new option.
    ///
    /// Blank input is ignored. Any other input replaces the previous proposed
    /// row, and the new row always starts at zero votes.
    pub fn propose_option(&mut self, raw_name: &str) {
        let name = raw_name.trim();
        if name.is_empty() {
            debug!("propose_option: ignoring blank proposal");
            return;
        }
        if let Some(previous) = &self.proposed {
            debug!(
                "propose_option: replacing {:?} ({} votes) with {:?}",
                previous.name, previous.intensity, name
            );
        }
        self.proposed = Some(ProposedOption {
            name: name.to_string(),
            intensity: Intensity::Zero,
        });
    }

    /// Removes the proposed row, if any.
    pub fn withdraw_proposal(&mut self) {
        self.proposed = None;
    }

    pub fn proposed(&self) -> Option<&ProposedOption> {
        self.proposed.as_ref()
    }

    /// The catalog rows, in catalog order.
    pub fn selections(&self) -> Vec<(&str, Intensity)> {
        self.catalog
            .names()
            .iter()
            .zip(self.rows.iter())
            .map(|(name, i)| (name.as_str(), *i))
            .collect()
    }

    pub fn total_cost(&self) -> u32 {
        let catalog_cost: u32 = self.rows.iter().map(|i| i.cost()).sum();
        let proposed_cost = self.proposed.as_ref().map_or(0, |p| p.intensity.cost());
        catalog_cost + proposed_cost
    }

    /// Clears all the selections and the proposed option.
    pub fn reset(&mut self) {
        self.rows = vec![Intensity::Zero; self.catalog.len()];
        self.proposed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> OptionCatalog {
        OptionCatalog::new(&["X".to_string(), "Y".to_string(), "Z".to_string()]).unwrap()
    }

    #[test]
    fn total_cost_over_all_assignments() {
        let cat = catalog();
        let mut ballot = Ballot::new(&cat);
        for a in 0..4u32 {
            for b in 0..4u32 {
                for c in 0..4u32 {
                    ballot.set_intensity("X", a).unwrap();
                    ballot.set_intensity("Y", b).unwrap();
                    ballot.set_intensity("Z", c).unwrap();
                    assert_eq!(ballot.total_cost(), a * a + b * b + c * c);
                    for (_, i) in ballot.selections() {
                        assert!(i.votes() <= 3);
                    }
                }
            }
        }
    }

    #[test]
    fn set_intensity_overwrites() {
        let mut ballot = Ballot::new(&catalog());
        ballot.set_intensity("X", 1).unwrap();
        ballot.set_intensity("X", 3).unwrap();
        assert_eq!(ballot.intensity("X"), Some(Intensity::Three));
        assert_eq!(ballot.total_cost(), 9);
    }

    #[test]
    fn rejects_bad_mutations() {
        let mut ballot = Ballot::new(&catalog());
        ballot.set_intensity("X", 2).unwrap();
        assert_eq!(
            ballot.set_intensity("X", 4),
            Err(BallotError::InvalidIntensity(4))
        );
        assert_eq!(
            ballot.set_intensity("W", 1),
            Err(BallotError::UnknownOption("W".to_string()))
        );
        // The rejected mutations left the row alone.
        assert_eq!(ballot.intensity("X"), Some(Intensity::Two));
        assert_eq!(
            ballot.set_proposed_intensity(1),
            Err(BallotError::UnknownOption("".to_string()))
        );
    }

    #[test]
    fn blank_proposal_is_ignored() {
        let mut ballot = Ballot::new(&catalog());
        ballot.propose_option("   ");
        ballot.propose_option("");
        assert_eq!(ballot.proposed(), None);

        ballot.propose_option("  New name ");
        ballot.set_intensity("New name", 2).unwrap();
        ballot.propose_option("\t");
        assert_eq!(ballot.intensity("New name"), Some(Intensity::Two));
    }

    #[test]
    fn proposal_starts_at_zero() {
        let mut ballot = Ballot::new(&catalog());
        ballot.propose_option("New name");
        assert_eq!(
            ballot.proposed(),
            Some(&ProposedOption {
                name: "New name".to_string(),
                intensity: Intensity::Zero
            })
        );
        assert_eq!(ballot.selections().len(), 3);
    }

    #[test]
    fn reproposing_resets_votes() {
        let mut ballot = Ballot::new(&catalog());
        ballot.propose_option("First");
        ballot.set_intensity("First", 3).unwrap();
        assert_eq!(ballot.total_cost(), 9);

        ballot.propose_option("Second");
        assert_eq!(ballot.intensity("First"), None);
        assert_eq!(ballot.intensity("Second"), Some(Intensity::Zero));
        assert_eq!(ballot.total_cost(), 0);
        assert_eq!(
            ballot.set_intensity("First", 1),
            Err(BallotError::UnknownOption("First".to_string()))
        );
    }

    #[test]
    fn catalog_name_wins_over_proposed_text() {
        let mut ballot = Ballot::new(&catalog());
        ballot.propose_option(" X ");
        ballot.set_intensity("X", 2).unwrap();
        assert_eq!(ballot.intensity("X"), Some(Intensity::Two));
        assert_eq!(ballot.proposed().map(|p| p.intensity), Some(Intensity::Zero));
        assert_eq!(ballot.total_cost(), 4);

        ballot.set_proposed_intensity(1).unwrap();
        assert_eq!(
            ballot.proposed(),
            Some(&ProposedOption {
                name: "X".to_string(),
                intensity: Intensity::One
            })
        );
        assert_eq!(ballot.intensity("X"), Some(Intensity::Two));
        assert_eq!(ballot.total_cost(), 5);
    }

    #[test]
    fn withdraw_and_reset() {
        let mut ballot = Ballot::new(&catalog());
        ballot.propose_option("Other");
        ballot.set_proposed_intensity(2).unwrap();
        ballot.set_intensity("Y", 1).unwrap();
        assert_eq!(ballot.total_cost(), 5);
        ballot.withdraw_proposal();
        assert_eq!(ballot.total_cost(), 1);
        ballot.reset();
        assert_eq!(ballot, Ballot::new(&catalog()));
    }
}
