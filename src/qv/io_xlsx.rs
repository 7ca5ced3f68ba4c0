// Reading an Excel export of the responses sheet.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use quadratic_voting::store::SheetTable;

use crate::qv::*;

/// Reads a worksheet of an Excel workbook. The first row is the header.
///
/// When no worksheet name is given, the workbook must either contain a
/// worksheet with the default name or a single worksheet.
pub fn read_xlsx_sheet(path: &str, worksheet_name_o: Option<&str>) -> QvResult<SheetTable> {
    debug!(
        "read_xlsx_sheet: path: {:?} worksheet: {:?}",
        path, worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    let wrange = if let Some(worksheet_name) = worksheet_name_o {
        workbook
            .worksheet_range(worksheet_name)
            .context(MissingWorksheetSnafu {
                name: worksheet_name,
                path,
            })?
            .context(OpeningExcelSnafu { path })?
    } else {
        let all_worksheets = workbook.worksheets();
        let default_ws = all_worksheets
            .iter()
            .find(|(name, _)| name == DEFAULT_WORKSHEET_NAME);
        match (default_ws, all_worksheets.as_slice()) {
            (Some((_, wrange)), _) => wrange.clone(),
            (None, [(worksheet_name, wrange)]) => {
                debug!("read_xlsx_sheet: using worksheet {:?}", worksheet_name);
                wrange.clone()
            }
            (None, []) => {
                whatever!("No worksheet in {}", path)
            }
            (None, _) => {
                whatever!(
                    "Multiple worksheets in {}, use --excel-worksheet-name to pick one",
                    path
                )
            }
        }
    };

    let mut raw: Vec<Vec<String>> = Vec::new();
    for (idx, row) in wrange.rows().enumerate() {
        let mut cells: Vec<String> = Vec::new();
        for cell in row.iter() {
            cells.push(read_cell(cell, idx as u64 + 1)?);
        }
        raw.push(cells);
    }
    info!("read_xlsx_sheet: read {} rows from {:?}", raw.len(), path);
    Ok(SheetTable::from_rows(raw))
}

fn read_cell(cell: &DataType, lineno: u64) -> QvResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Empty => Ok("".to_string()),
        DataType::Int(i) => Ok(i.to_string()),
        // Vote counts come back as floats from most spreadsheet exports.
        DataType::Float(f) if f.fract() == 0.0 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        _ => Err(QvError::ExcelWrongCellType {
            lineno,
            content: format!("{:?}", cell),
        }),
    }
}
