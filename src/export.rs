//! Excel export of recorded entries.

use chrono::FixedOffset;
use rust_xlsxwriter::{Workbook, XlsxError};

use crate::error::ApiError;
use crate::store::entries::EntryRecord;

/// Entry timestamps are stored in UTC and shown in the mall's local time.
const KST_OFFSET_SECS: i32 = 9 * 3600;

const SHEET_NAME: &str = "Lucky Draw Entries";

const COLUMNS: [(&str, f64); 4] = [
    ("Entry Date", 30.0),
    ("Member ID", 20.0),
    ("Cellphone", 20.0),
    ("Name", 20.0),
];

/// Build the participants workbook in memory.
pub fn entries_workbook(entries: &[EntryRecord]) -> Result<Vec<u8>, ApiError> {
    build(entries).map_err(|e| ApiError::Internal(format!("workbook build failed: {e}")))
}

fn build(entries: &[EntryRecord]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name(SHEET_NAME)?;

    for (col, (title, width)) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        sheet.write(0, col, *title)?;
        sheet.set_column_width(col, *width)?;
    }

    for (row, entry) in entries.iter().enumerate() {
        let row = (row + 1) as u32;
        sheet.write(row, 0, entry_date_kst(entry))?;
        sheet.write(row, 1, entry.member_id.as_str())?;
        sheet.write(row, 2, entry.cellphone.as_str())?;
        sheet.write(row, 3, entry.name.as_str())?;
    }

    workbook.save_to_buffer()
}

/// Render a stored UTC timestamp as KST wall-clock time.
fn entry_date_kst(entry: &EntryRecord) -> String {
    let millis = entry.created_at.timestamp_millis();
    let Some(utc) = chrono::DateTime::from_timestamp_millis(millis) else {
        return String::new();
    };
    match FixedOffset::east_opt(KST_OFFSET_SECS) {
        Some(kst) => utc.with_timezone(&kst).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => utc.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}
