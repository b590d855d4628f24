use crate::sheets::RecordTable;
use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

pub const SHEET_NAME: &str = "Relatorio";

/// Serializes the table to an in-memory XLSX file: bold header, one row per record.
pub fn build_workbook(table: &RecordTable) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet
        .set_name(SHEET_NAME)
        .context("Failed to name report worksheet")?;

    let header_format = Format::new().set_bold();

    for (col, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &header_format)
            .context("Failed to write report header")?;
    }

    for (row_index, row) in table.rows.iter().enumerate() {
        let excel_row = (row_index + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            worksheet
                .write_string(excel_row, col as u16, value)
                .with_context(|| format!("Failed to write report row {excel_row}"))?;
        }
    }

    workbook.push_worksheet(worksheet);

    workbook
        .save_to_buffer()
        .context("Failed to serialize report workbook")
}
