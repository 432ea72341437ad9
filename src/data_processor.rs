use crate::models::{Appointment, AppointmentTable, PeriodFilter, ReportLine, SalespersonGroup};
use crate::normalize::normalize_text;
use crate::schema::ColumnRole;
use std::collections::HashMap;
use tracing::{info, warn};

/// 按期间过滤，保持原顺序
pub fn filter_appointments<'a>(
    table: &'a AppointmentTable,
    period: &PeriodFilter,
) -> Vec<&'a Appointment> {
    table
        .rows
        .iter()
        .filter(|row| period.matches(row.date))
        .collect()
}

/// 按业务员原样名称分组，分组顺序为首次出现的顺序
///
/// 没有业务员列时所有行归入一个隐式分组（None）；业务员单元格为空的行也归入隐式分组。
pub fn group_by_salesperson<'a>(
    table: &AppointmentTable,
    rows: &[&'a Appointment],
) -> Vec<SalespersonGroup<'a>> {
    if !table.has_column(ColumnRole::Salesperson) {
        if rows.is_empty() {
            return Vec::new();
        }
        warn!(
            rows = rows.len(),
            "no salesperson column, all rows go into a single group"
        );
        return vec![SalespersonGroup {
            salesperson: None,
            rows: rows.to_vec(),
        }];
    }

    let mut groups: Vec<SalespersonGroup<'a>> = Vec::new();
    let mut index: HashMap<Option<String>, usize> = HashMap::new();

    for row in rows {
        let key = table.text(row, ColumnRole::Salesperson);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(SalespersonGroup {
                salesperson: key,
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push(*row);
    }

    groups
}

/// 目标名单中任一名称（归一化后）包含在业务员名称中即视为匹配
pub fn matches_target(salesperson: &str, targets: &[String]) -> bool {
    let name = normalize_text(salesperson);
    targets
        .iter()
        .map(|t| normalize_text(t.trim()))
        .filter(|t| !t.is_empty())
        .any(|t| name.contains(&t))
}

/// 按目标名单筛选分组；名单为空时保留全部
pub fn select_groups<'a>(
    table: &AppointmentTable,
    groups: Vec<SalespersonGroup<'a>>,
    targets: &[String],
) -> Vec<SalespersonGroup<'a>> {
    if targets.iter().all(|t| t.trim().is_empty()) {
        return groups;
    }

    let column_resolved = table.has_column(ColumnRole::Salesperson);

    groups
        .into_iter()
        .filter(|group| match group.salesperson.as_deref() {
            Some(name) => matches_target(name, targets),
            None if !column_resolved => {
                warn!("salesperson filter ignored: no salesperson column in source");
                true
            }
            None => {
                warn!(
                    rows = group.rows.len(),
                    "rows without salesperson excluded by target list"
                );
                false
            }
        })
        .collect()
}

/// 过滤、分组、筛选一步完成
pub fn collect_groups<'a>(
    table: &'a AppointmentTable,
    period: &PeriodFilter,
    targets: &[String],
) -> (usize, Vec<SalespersonGroup<'a>>) {
    let filtered = filter_appointments(table, period);
    let groups = group_by_salesperson(table, &filtered);
    let total_groups = groups.len();
    let selected = select_groups(table, groups, targets);

    info!(
        matched_rows = filtered.len(),
        groups = total_groups,
        selected = selected.len(),
        "appointments filtered"
    );

    (filtered.len(), selected)
}

/// 把分组中的行映射为报告行（日期、事由、地址），保持输入顺序
pub fn report_lines(table: &AppointmentTable, group: &SalespersonGroup<'_>) -> Vec<ReportLine> {
    group
        .rows
        .iter()
        .map(|row| ReportLine {
            date: row.date,
            reason: table.text(row, ColumnRole::Reason).unwrap_or_default(),
            address: table.text(row, ColumnRole::Address),
        })
        .collect()
}
