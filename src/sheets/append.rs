use crate::config::AppendMode;
use crate::sheets::SheetAccessor;
use anyhow::Result;
use tracing::info;

/// Where a saved row ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPosition {
    /// 1-based row index chosen by counting the used rows.
    Inserted(usize),
    /// Placed by the provider after its own last tracked row.
    Appended,
}

/// Writes one row to the tab named `tab_name`.
///
/// In `Insert` mode the tab is read in full and the row goes right after the
/// last used row, so existing rows are never overwritten by a single writer.
/// Two writers that count at the same time can still pick the same index.
pub fn save_row(
    accessor: &SheetAccessor,
    tab_name: &str,
    values: &[String],
    mode: AppendMode,
) -> Result<RowPosition> {
    let worksheet = accessor.worksheet(tab_name)?;

    match mode {
        AppendMode::Insert => {
            let used_rows = worksheet.get_all_values()?.len();
            let index = used_rows + 1;
            worksheet.insert_row(values, index)?;
            info!(tab = %worksheet.title(), row = index, "row inserted");
            Ok(RowPosition::Inserted(index))
        }
        AppendMode::Append => {
            worksheet.append_row(values)?;
            info!(tab = %worksheet.title(), "row appended");
            Ok(RowPosition::Appended)
        }
    }
}
