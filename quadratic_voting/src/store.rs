use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::ballot::Ballot;
pub use crate::config::*;
use crate::identity::normalize;

/// An opaque reference to a stored row.
///
/// For sheet-backed stores it is the 1-based sheet row number, the header
/// being row 1.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct RowHandle(usize);

impl RowHandle {
    pub fn new(sheet_row: usize) -> RowHandle {
        RowHandle(sheet_row)
    }

    pub fn sheet_row(&self) -> usize {
        self.0
    }
}

/// The flattened, persisted form of a ballot: column names and cell values
/// in insertion order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct StoredBallotRow {
    pub cells: Vec<(String, String)>,
}

impl StoredBallotRow {
    /// Flattens a ballot. The timestamp is the moment of persistence.
    pub fn from_ballot(email: &str, ballot: &Ballot, submitted_at: DateTime<Utc>) -> Self {
        let mut cells: Vec<(String, String)> = vec![
            (
                TIMESTAMP_COLUMN.to_string(),
                submitted_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
            (EMAIL_COLUMN.to_string(), email.to_string()),
            (TOTAL_COST_COLUMN.to_string(), ballot.total_cost().to_string()),
        ];
        for (name, intensity) in ballot.selections() {
            cells.push((name.to_string(), intensity.to_string()));
        }
        let (proposed_text, proposed_votes) = match ballot.proposed() {
            Some(p) => (p.name.clone(), p.intensity.to_string()),
            None => ("".to_string(), "0".to_string()),
        };
        cells.push((PROPOSED_TEXT_COLUMN.to_string(), proposed_text));
        cells.push((PROPOSED_VOTES_COLUMN.to_string(), proposed_votes));
        StoredBallotRow { cells }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> Vec<&str> {
        self.cells.iter().map(|(k, _)| k.as_str()).collect()
    }
}

/// The operations the submission flow needs from the backing store.
///
/// Implementations are expected to serialize individual calls. Nothing here
/// coordinates two sessions submitting the same email at the same time.
pub trait BallotStore {
    /// All the normalized emails that currently have a stored ballot.
    fn known_identities(&mut self) -> Result<HashSet<String>, StoreError>;

    /// The rows stored for one identity. There may be more than one if an
    /// earlier replace went wrong.
    fn find_ballot_row_ids(&mut self, email: &str) -> Result<Vec<RowHandle>, StoreError>;

    fn delete_rows(&mut self, rows: &[RowHandle]) -> Result<(), StoreError>;

    /// Appends a row in the established column order. The first row ever
    /// appended establishes that order.
    fn append_row(&mut self, row: &StoredBallotRow) -> Result<(), StoreError>;

    /// Drops any cached view of `known_identities`.
    fn invalidate_identity_cache(&mut self) {}
}

impl<S: BallotStore + ?Sized> BallotStore for &mut S {
    fn known_identities(&mut self) -> Result<HashSet<String>, StoreError> {
        (**self).known_identities()
    }

    fn find_ballot_row_ids(&mut self, email: &str) -> Result<Vec<RowHandle>, StoreError> {
        (**self).find_ballot_row_ids(email)
    }

    fn delete_rows(&mut self, rows: &[RowHandle]) -> Result<(), StoreError> {
        (**self).delete_rows(rows)
    }

    fn append_row(&mut self, row: &StoredBallotRow) -> Result<(), StoreError> {
        (**self).append_row(row)
    }

    fn invalidate_identity_cache(&mut self) {
        (**self).invalidate_identity_cache()
    }
}

/// A worksheet held in memory: one header row followed by data rows.
///
/// This is the reference implementation of [`BallotStore`]. File-backed
/// stores load and save one of these.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SheetTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SheetTable {
    pub fn new() -> SheetTable {
        SheetTable::default()
    }

    /// Builds a sheet from raw rows, the first one being the header.
    /// Empty trailing header cells are dropped.
    pub fn from_rows(mut raw: Vec<Vec<String>>) -> SheetTable {
        if raw.is_empty() {
            return SheetTable::new();
        }
        let mut header = raw.remove(0);
        while header.last().map_or(false, |h| h.is_empty()) {
            header.pop();
        }
        SheetTable { header, rows: raw }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// The values of a column, without the header.
    pub fn column_values(&self, name: &str) -> Vec<&str> {
        match self.column_index(name) {
            Some(idx) => self
                .rows
                .iter()
                .map(|r| r.get(idx).map(|s| s.as_str()).unwrap_or(""))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The cells of a sheet row as a column -> value record.
    pub fn record(&self, handle: RowHandle) -> Option<StoredBallotRow> {
        let row = self.rows.get(handle.0.checked_sub(2)?)?;
        let cells = self
            .header
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.clone(), row.get(idx).cloned().unwrap_or_default()))
            .collect();
        Some(StoredBallotRow { cells })
    }

    /// Sheet rows whose cell in `column` matches `value` once normalized.
    /// The header is never matched.
    pub fn find_rows(&self, column: &str, value: &str) -> Vec<RowHandle> {
        let target = normalize(value);
        match self.column_index(column) {
            Some(idx) => self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, r)| r.get(idx).map_or(false, |c| normalize(c) == target))
                .map(|(pos, _)| RowHandle(pos + 2))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Deletes rows, from the bottom up so that the handles stay valid.
    /// Nothing is deleted if one of the handles does not point to a data row.
    pub fn remove_rows(&mut self, handles: &[RowHandle]) -> Result<(), StoreError> {
        let mut sheet_rows: Vec<usize> = handles.iter().map(|h| h.0).collect();
        sheet_rows.sort_unstable();
        sheet_rows.dedup();
        if let Some(bad) = sheet_rows
            .iter()
            .find(|r| **r < 2 || **r - 2 >= self.rows.len())
        {
            return Err(StoreError::PersistenceFailure(format!(
                "row {} is not a data row",
                bad
            )));
        }
        for r in sheet_rows.iter().rev() {
            self.rows.remove(r - 2);
        }
        Ok(())
    }

    /// Appends a record. The header is written first if the sheet has none;
    /// otherwise the cells follow the existing header and unknown columns
    /// are left out.
    pub fn push_record(&mut self, row: &StoredBallotRow) {
        if self.header.is_empty() {
            info!("push_record: establishing header {:?}", row.columns());
            self.header = row.cells.iter().map(|(k, _)| k.clone()).collect();
        }
        let cells: Vec<String> = self
            .header
            .iter()
            .map(|h| row.get(h).unwrap_or("").to_string())
            .collect();
        self.rows.push(cells);
    }
}

impl BallotStore for SheetTable {
    fn known_identities(&mut self) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .column_values(EMAIL_COLUMN)
            .iter()
            .map(|e| normalize(e))
            .filter(|e| !e.is_empty())
            .collect())
    }

    fn find_ballot_row_ids(&mut self, email: &str) -> Result<Vec<RowHandle>, StoreError> {
        if email.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.find_rows(EMAIL_COLUMN, email))
    }

    fn delete_rows(&mut self, rows: &[RowHandle]) -> Result<(), StoreError> {
        self.remove_rows(rows)
    }

    fn append_row(&mut self, row: &StoredBallotRow) -> Result<(), StoreError> {
        self.push_record(row);
        Ok(())
    }
}

pub const DEFAULT_IDENTITY_TTL: Duration = Duration::from_secs(120);

/// Caches `known_identities` of another store for a fixed duration.
///
/// The cache is only dropped when it expires or when
/// `invalidate_identity_cache` is called.
pub struct CachedIdentities<S> {
    inner: S,
    ttl: Duration,
    cached: Option<(Instant, HashSet<String>)>,
}

impl<S: BallotStore> CachedIdentities<S> {
    pub fn new(inner: S, ttl: Duration) -> CachedIdentities<S> {
        CachedIdentities {
            inner,
            ttl,
            cached: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: BallotStore> BallotStore for CachedIdentities<S> {
    fn known_identities(&mut self) -> Result<HashSet<String>, StoreError> {
        if let Some((at, ids)) = &self.cached {
            if at.elapsed() < self.ttl {
                return Ok(ids.clone());
            }
            debug!("known_identities: cache expired");
        }
        let ids = self.inner.known_identities()?;
        debug!("known_identities: cached {} identities", ids.len());
        self.cached = Some((Instant::now(), ids.clone()));
        Ok(ids)
    }

    fn find_ballot_row_ids(&mut self, email: &str) -> Result<Vec<RowHandle>, StoreError> {
        self.inner.find_ballot_row_ids(email)
    }

    fn delete_rows(&mut self, rows: &[RowHandle]) -> Result<(), StoreError> {
        self.inner.delete_rows(rows)
    }

    fn append_row(&mut self, row: &StoredBallotRow) -> Result<(), StoreError> {
        self.inner.append_row(row)
    }

    fn invalidate_identity_cache(&mut self) {
        self.cached = None;
        self.inner.invalidate_identity_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(email: &str, cost: &str) -> StoredBallotRow {
        StoredBallotRow {
            cells: vec![
                (EMAIL_COLUMN.to_string(), email.to_string()),
                (TOTAL_COST_COLUMN.to_string(), cost.to_string()),
            ],
        }
    }

    #[test]
    fn first_append_establishes_header() {
        let mut sheet = SheetTable::new();
        sheet.append_row(&row("a@b.com", "5")).unwrap();
        assert_eq!(sheet.header(), &["email", "total_cost"]);

        // Later rows follow the header, whatever their own order.
        let reordered = StoredBallotRow {
            cells: vec![
                (TOTAL_COST_COLUMN.to_string(), "9".to_string()),
                ("extra".to_string(), "x".to_string()),
                (EMAIL_COLUMN.to_string(), "c@d.com".to_string()),
            ],
        };
        sheet.append_row(&reordered).unwrap();
        assert_eq!(sheet.header(), &["email", "total_cost"]);
        assert_eq!(sheet.rows()[1], vec!["c@d.com".to_string(), "9".to_string()]);
    }

    #[test]
    fn missing_columns_become_empty_cells() {
        let mut sheet = SheetTable::from_rows(vec![vec![
            "email".to_string(),
            "total_cost".to_string(),
            "note".to_string(),
        ]]);
        sheet.append_row(&row("a@b.com", "1")).unwrap();
        assert_eq!(
            sheet.record(RowHandle::new(2)).unwrap().get("note"),
            Some("")
        );
    }

    #[test]
    fn identities_are_normalized() {
        let mut sheet = SheetTable::new();
        sheet.append_row(&row(" A@B.com", "1")).unwrap();
        sheet.append_row(&row("c@d.com", "1")).unwrap();
        let ids = sheet.known_identities().unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("a@b.com"));
        assert_eq!(
            sheet.find_ballot_row_ids("a@b.com").unwrap(),
            vec![RowHandle::new(2)]
        );
    }

    #[test]
    fn header_is_never_matched() {
        let mut sheet = SheetTable::new();
        sheet.append_row(&row("a@b.com", "1")).unwrap();
        assert!(sheet.find_ballot_row_ids("email").unwrap().is_empty());
        assert!(sheet.find_ballot_row_ids("").unwrap().is_empty());
    }

    #[test]
    fn delete_all_rows_of_an_identity() {
        let mut sheet = SheetTable::new();
        sheet.append_row(&row("a@b.com", "1")).unwrap();
        sheet.append_row(&row("c@d.com", "2")).unwrap();
        sheet.append_row(&row("a@b.com", "3")).unwrap();
        let handles = sheet.find_ballot_row_ids("a@b.com").unwrap();
        assert_eq!(handles, vec![RowHandle::new(2), RowHandle::new(4)]);
        sheet.delete_rows(&handles).unwrap();
        assert_eq!(sheet.rows().len(), 1);
        assert_eq!(sheet.column_values(EMAIL_COLUMN), vec!["c@d.com"]);
    }

    #[test]
    fn delete_is_all_or_nothing() {
        let mut sheet = SheetTable::new();
        sheet.append_row(&row("a@b.com", "1")).unwrap();
        let res = sheet.delete_rows(&[RowHandle::new(2), RowHandle::new(7)]);
        assert!(res.is_err());
        assert_eq!(sheet.rows().len(), 1);
        assert!(sheet.delete_rows(&[RowHandle::new(1)]).is_err());
    }

    #[test]
    fn flatten_ballot() {
        let catalog = OptionCatalog::new(&["X".to_string(), "Y".to_string()]).unwrap();
        let mut ballot = Ballot::new(&catalog);
        ballot.set_intensity("X", 2).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let flat = StoredBallotRow::from_ballot("a@b.com", &ballot, at);
        assert_eq!(
            flat.columns(),
            vec![
                "timestamp_utc",
                "email",
                "total_cost",
                "X",
                "Y",
                "Other (text)",
                "Other (votes)"
            ]
        );
        assert_eq!(flat.get(TIMESTAMP_COLUMN), Some("2024-03-01T12:30:00.000000Z"));
        assert_eq!(flat.get(TOTAL_COST_COLUMN), Some("4"));
        assert_eq!(flat.get("Y"), Some("0"));
        assert_eq!(flat.get(PROPOSED_TEXT_COLUMN), Some(""));
        assert_eq!(flat.get(PROPOSED_VOTES_COLUMN), Some("0"));

        ballot.propose_option("Mine");
        ballot.set_proposed_intensity(1).unwrap();
        let flat = StoredBallotRow::from_ballot("a@b.com", &ballot, at);
        assert_eq!(flat.get(PROPOSED_TEXT_COLUMN), Some("Mine"));
        assert_eq!(flat.get(PROPOSED_VOTES_COLUMN), Some("1"));
        assert_eq!(flat.get(TOTAL_COST_COLUMN), Some("5"));
    }

    #[test]
    fn cached_identities_until_invalidated() {
        let mut sheet = SheetTable::new();
        sheet.append_row(&row("a@b.com", "1")).unwrap();
        let mut store = CachedIdentities::new(sheet, DEFAULT_IDENTITY_TTL);
        assert_eq!(store.known_identities().unwrap().len(), 1);

        store.append_row(&row("c@d.com", "1")).unwrap();
        // Stale until invalidated.
        assert_eq!(store.known_identities().unwrap().len(), 1);
        store.invalidate_identity_cache();
        assert_eq!(store.known_identities().unwrap().len(), 2);
        assert_eq!(store.inner().rows().len(), 2);
    }

    #[test]
    fn zero_ttl_always_refreshes() {
        let mut store = CachedIdentities::new(SheetTable::new(), Duration::ZERO);
        assert!(store.known_identities().unwrap().is_empty());
        store.append_row(&row("a@b.com", "1")).unwrap();
        assert_eq!(store.known_identities().unwrap().len(), 1);
    }
}
