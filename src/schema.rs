use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::normalize::normalize_text;

/// 列的逻辑角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Year,
    Month,
    Day,
    Salesperson,
    Reason,
    Address,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 6] = [
        ColumnRole::Year,
        ColumnRole::Month,
        ColumnRole::Day,
        ColumnRole::Salesperson,
        ColumnRole::Reason,
        ColumnRole::Address,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Salesperson => "salesperson",
            Self::Reason => "reason",
            Self::Address => "address",
        }
    }

    /// 关键字按优先级排列，法语在前
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Year => &["annee", "year"],
            Self::Month => &["mois", "month"],
            Self::Day => &["jour", "day"],
            Self::Salesperson => &["commercial", "salesperson"],
            Self::Reason => &["raison", "motif", "reason"],
            Self::Address => &["adresse", "address"],
        }
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::Year | Self::Month | Self::Day)
    }
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 已识别的列：位置 + 原始表头
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub index: usize,
    pub name: String,
}

/// 逻辑角色到实际列的映射，加载时构建一次
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub year: Option<ResolvedColumn>,
    pub month: Option<ResolvedColumn>,
    pub day: Option<ResolvedColumn>,
    pub salesperson: Option<ResolvedColumn>,
    pub reason: Option<ResolvedColumn>,
    pub address: Option<ResolvedColumn>,
}

impl ColumnMapping {
    pub fn get(&self, role: ColumnRole) -> Option<&ResolvedColumn> {
        match role {
            ColumnRole::Year => self.year.as_ref(),
            ColumnRole::Month => self.month.as_ref(),
            ColumnRole::Day => self.day.as_ref(),
            ColumnRole::Salesperson => self.salesperson.as_ref(),
            ColumnRole::Reason => self.reason.as_ref(),
            ColumnRole::Address => self.address.as_ref(),
        }
    }

    fn slot(&mut self, role: ColumnRole) -> &mut Option<ResolvedColumn> {
        match role {
            ColumnRole::Year => &mut self.year,
            ColumnRole::Month => &mut self.month,
            ColumnRole::Day => &mut self.day,
            ColumnRole::Salesperson => &mut self.salesperson,
            ColumnRole::Reason => &mut self.reason,
            ColumnRole::Address => &mut self.address,
        }
    }

    /// 年、月、日三列必须存在，否则列出全部缺失角色
    pub fn require_date_columns(&self) -> Result<(usize, usize, usize)> {
        match (&self.year, &self.month, &self.day) {
            (Some(y), Some(m), Some(d)) => Ok((y.index, m.index, d.index)),
            _ => {
                let roles = ColumnRole::ALL
                    .into_iter()
                    .filter(|r| r.is_mandatory() && self.get(*r).is_none())
                    .collect();
                Err(ReportError::MissingColumns { roles })
            }
        }
    }
}

/// 返回第一个归一化后包含关键字的列名
pub fn detect_column<'a, S: AsRef<str>>(columns: &'a [S], keyword: &str) -> Option<&'a str> {
    detect_column_index(columns, keyword).map(|i| columns[i].as_ref())
}

fn detect_column_index<S: AsRef<str>>(columns: &[S], keyword: &str) -> Option<usize> {
    let keyword_norm = normalize_text(keyword);
    columns
        .iter()
        .position(|col| normalize_text(col.as_ref()).contains(&keyword_norm))
}

/// 为每个角色识别列
pub fn resolve_columns<S: AsRef<str>>(headers: &[S]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();

    for role in ColumnRole::ALL {
        let found = role
            .keywords()
            .iter()
            .find_map(|kw| detect_column_index(headers, kw));

        match found {
            Some(index) => {
                let name = headers[index].as_ref().to_string();
                debug!(role = role.as_str(), column = %name, "column resolved");
                *mapping.slot(role) = Some(ResolvedColumn { index, name });
            }
            None => debug!(role = role.as_str(), "column not found"),
        }
    }

    mapping
}
