use std::path::Path;

use chrono::NaiveDate;
use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, Worksheet, XlsxError};

pub const KEY_PREFIX: &str = "dynamodb_reports";
pub const SHEET_NAME: &str = "DynamoDB Metrics";
pub const HEADER: [&str; 4] = [
    "Table Name",
    "Consumed Read Capacity Units",
    "Consumed Write Capacity Units",
    "Table Size (Bytes)",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TableRecord {
    pub name: String,
    pub consumed_read_capacity: f64,
    pub consumed_write_capacity: f64,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl TableRecord {
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.name.to_owned()),
            Cell::Number(self.consumed_read_capacity),
            Cell::Number(self.consumed_write_capacity),
            Cell::Number(self.size_bytes as f64),
        ]
    }
}

/// One invocation's worth of table records, in listing order.
#[derive(Debug, Clone, Default)]
pub struct Report {
    records: Vec<TableRecord>,
}

impl Report {
    pub fn new(records: Vec<TableRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[TableRecord] {
        &self.records
    }

    /// The header row followed by one row per record.
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        let header: Vec<Cell> = HEADER.iter().map(|h| Cell::Text(h.to_string())).collect();
        std::iter::once(header)
            .chain(self.records.iter().map(TableRecord::cells))
            .collect()
    }

    pub fn to_workbook(&self) -> Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (row, cells) in (0 as RowNum..).zip(self.rows()) {
            for (col, cell) in (0 as ColNum..).zip(cells) {
                write_cell(worksheet, row, col, cell, if row == 0 { Some(&bold) } else { None })?;
            }
        }
        worksheet.autofit();
        Ok(workbook)
    }

    pub fn save(&self, path: &Path) -> Result<(), XlsxError> {
        self.to_workbook()?.save(path)
    }

    #[cfg(test)]
    fn to_buffer(&self) -> Result<Vec<u8>, XlsxError> {
        self.to_workbook()?.save_to_buffer()
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    cell: Cell,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    match (cell, format) {
        (Cell::Text(s), Some(f)) => worksheet.write_string_with_format(row, col, s, f)?,
        (Cell::Text(s), None) => worksheet.write_string(row, col, s)?,
        (Cell::Number(n), Some(f)) => worksheet.write_number_with_format(row, col, n, f)?,
        (Cell::Number(n), None) => worksheet.write_number(row, col, n)?,
    };
    Ok(())
}

pub fn report_file_name(date: NaiveDate) -> String {
    format!("dynamodb_metrics_{}.xlsx", date.format("%Y-%m-%d"))
}

/// Object key for the day's report. Same date, same key.
pub fn report_key(date: NaiveDate) -> String {
    format!("{}/{}", KEY_PREFIX, report_file_name(date))
}
