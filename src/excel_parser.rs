use crate::error::{ReportError, Result};
use crate::locale::month_from_name;
use crate::models::{Appointment, AppointmentTable, RejectedRow};
use crate::schema::resolve_columns;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{info, warn};

/// 从 Excel 文件的第一个工作表加载预约表
pub fn load_appointments(file_path: &Path) -> Result<AppointmentTable> {
    let mut workbook = open_workbook_auto(file_path).map_err(|source| ReportError::OpenWorkbook {
        path: file_path.to_path_buf(),
        source,
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ReportError::EmptyWorkbook {
            path: file_path.to_path_buf(),
        })?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|source| ReportError::OpenWorkbook {
            path: file_path.to_path_buf(),
            source,
        })?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let table = build_table(range.rows(), first_row)?;

    info!(
        file = %file_path.display(),
        sheet = %sheet_name,
        rows = table.len(),
        rejected = table.rejected.len(),
        "appointments loaded"
    );

    Ok(table)
}

/// 第一行为表头，其余为数据行；`first_row` 为表头在工作表中的行索引（从 0 开始）
pub fn build_table<'r, I>(rows: I, first_row: usize) -> Result<AppointmentTable>
where
    I: IntoIterator<Item = &'r [Data]>,
{
    let mut rows = rows.into_iter();

    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();

    let mapping = resolve_columns(&headers);
    let (idx_year, idx_month, idx_day) = mapping.require_date_columns()?;

    let mut table = AppointmentTable {
        headers,
        mapping,
        rows: Vec::new(),
        rejected: Vec::new(),
    };

    for (offset, row) in rows.enumerate() {
        // 表头占一行，行号从 1 开始
        let row_number = first_row + offset + 2;

        // 跳过空行
        if row.iter().all(is_blank) {
            continue;
        }

        let empty = Data::Empty;
        let year = row.get(idx_year).unwrap_or(&empty);
        let month = row.get(idx_month).unwrap_or(&empty);
        let day = row.get(idx_day).unwrap_or(&empty);

        match compose_date(year, month, day) {
            Ok(date) => table.rows.push(Appointment {
                row_number,
                cells: row.to_vec(),
                date,
            }),
            Err(reason) => {
                warn!(row = row_number, %reason, "row rejected");
                table.rejected.push(RejectedRow { row_number, reason });
            }
        }
    }

    Ok(table)
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// 由三列合成日期，不做任何修正（2 月 30 日直接拒绝）
pub fn compose_date(
    year: &Data,
    month: &Data,
    day: &Data,
) -> std::result::Result<NaiveDate, String> {
    let y = extract_integer(year)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| format!("invalid year value '{year}'"))?;
    let m = extract_month(month)
        .ok_or_else(|| format!("invalid month value '{month}'"))?;
    let d = extract_integer(day)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("invalid day value '{day}'"))?;

    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| format!("invalid date {y:04}-{m:02}-{d:02}"))
}

/// 从单元格提取整数，带小数部分的值不接受
fn extract_integer(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) => whole(*f),
        Data::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        _ => None,
    }
}

fn whole(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// 月份可以是数字或月份名称
fn extract_month(cell: &Data) -> Option<u32> {
    let from_number = extract_integer(cell).and_then(|v| u32::try_from(v).ok());
    match (from_number, cell) {
        (Some(m), _) => Some(m),
        (None, Data::String(s)) => month_from_name(s),
        _ => None,
    }
}
