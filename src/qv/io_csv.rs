// The responses sheet, stored as a CSV file.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use quadratic_voting::store::{RowHandle, SheetTable, StoredBallotRow};

use crate::qv::*;

/// A [`BallotStore`] backed by a CSV file holding one header row and one
/// row per ballot.
///
/// Every operation reads the file again so that ballots written by other
/// sessions are seen. Mutations rewrite the whole file while holding an
/// exclusive lock on `<path>.lock`, so concurrent writers are serialized.
pub struct CsvSheetStore {
    path: PathBuf,
}

impl CsvSheetStore {
    /// Opens the store, creating an empty sheet if the file does not exist.
    pub fn open(path: &str) -> QvResult<CsvSheetStore> {
        let p = PathBuf::from(path);
        if !p.exists() {
            info!("CsvSheetStore: creating empty sheet {:?}", path);
            // Never truncates a sheet created meanwhile by another session.
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&p)
                .context(StoreIoSnafu { path })?;
        }
        Ok(CsvSheetStore { path: p })
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Takes the exclusive lock of the sheet. It is released when the
    /// returned file is dropped.
    fn lock(&self) -> QvResult<File> {
        let lock_p = self.lock_path();
        let lock_path = lock_p.display().to_string();
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_p)
            .context(StoreIoSnafu {
                path: lock_path.clone(),
            })?;
        lock_file
            .lock_exclusive()
            .context(StoreIoSnafu { path: lock_path })?;
        Ok(lock_file)
    }

    pub fn path(&self) -> String {
        self.path.display().to_string()
    }

    pub fn load(&self) -> QvResult<SheetTable> {
        let path = self.path();
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .context(CsvOpenSnafu { path: path.clone() })?;
        let mut raw: Vec<Vec<String>> = Vec::new();
        for line_r in rdr.into_records() {
            let line = line_r.context(CsvOpenSnafu { path: path.clone() })?;
            raw.push(line.iter().map(|s| s.to_string()).collect());
        }
        debug!("CsvSheetStore::load: {} rows from {:?}", raw.len(), path);
        Ok(SheetTable::from_rows(raw))
    }

    /// Writes the sheet to a fresh temporary file next to the store and
    /// moves it in place. Callers hold the lock.
    fn save(&self, sheet: &SheetTable) -> QvResult<()> {
        let path = self.path();
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let mut tmp =
            NamedTempFile::new_in(dir).context(StoreIoSnafu { path: path.clone() })?;
        {
            let mut wtr = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(tmp.as_file_mut());
            if !sheet.header().is_empty() {
                wtr.write_record(sheet.header())
                    .context(CsvWriteSnafu { path: path.clone() })?;
            }
            for row in sheet.rows() {
                wtr.write_record(row)
                    .context(CsvWriteSnafu { path: path.clone() })?;
            }
            wtr.flush().context(StoreIoSnafu { path: path.clone() })?;
        }
        tmp.as_file_mut()
            .flush()
            .context(StoreIoSnafu { path: path.clone() })?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .context(StoreIoSnafu { path })?;
        Ok(())
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut SheetTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = self.lock().map_err(to_store_error)?;
        let mut sheet = self.load().map_err(to_store_error)?;
        let res = f(&mut sheet)?;
        self.save(&sheet).map_err(to_store_error)?;
        Ok(res)
    }
}

fn to_store_error(e: QvError) -> StoreError {
    StoreError::PersistenceFailure(e.to_string())
}

impl BallotStore for CsvSheetStore {
    fn known_identities(&mut self) -> Result<HashSet<String>, StoreError> {
        self.load().map_err(to_store_error)?.known_identities()
    }

    fn find_ballot_row_ids(&mut self, email: &str) -> Result<Vec<RowHandle>, StoreError> {
        self.load().map_err(to_store_error)?.find_ballot_row_ids(email)
    }

    fn delete_rows(&mut self, rows: &[RowHandle]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.update(|sheet| sheet.delete_rows(rows))
    }

    fn append_row(&mut self, row: &StoredBallotRow) -> Result<(), StoreError> {
        self.update(|sheet| sheet.append_row(row))
    }
}

/// Replaces the content of the store with the given sheet.
pub fn write_sheet(path: &str, sheet: &SheetTable) -> QvResult<()> {
    let store = CsvSheetStore::open(path)?;
    let _lock = store.lock()?;
    store.save(sheet)
}
