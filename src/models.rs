use calamine::Data;
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ReportError, Result};
use crate::locale::Language;
use crate::schema::{ColumnMapping, ColumnRole};

/// 一条预约 (RDV)
#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    /// 表格中的行号（从 1 开始，含表头）
    pub row_number: usize,
    /// 原始单元格，顺序与表头一致
    pub cells: Vec<Data>,
    /// 由年/月/日三列合成的日期
    pub date: NaiveDate,
}

/// 被丢弃的行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub row_number: usize,
    pub reason: String,
}

/// 加载后的预约表
#[derive(Debug, Clone, Default)]
pub struct AppointmentTable {
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    pub rows: Vec<Appointment>,
    pub rejected: Vec<RejectedRow>,
}

impl AppointmentTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 按列名取单元格
    pub fn cell<'a>(&self, row: &'a Appointment, column: &str) -> Option<&'a Data> {
        let index = self.headers.iter().position(|h| h == column)?;
        row.cells.get(index)
    }

    /// 按角色取非空文本；角色未识别或单元格为空时返回 None
    pub fn text(&self, row: &Appointment, role: ColumnRole) -> Option<String> {
        let column = self.mapping.get(role)?;
        row.cells.get(column.index).and_then(cell_text)
    }

    pub fn has_column(&self, role: ColumnRole) -> bool {
        self.mapping.get(role).is_some()
    }
}

/// 单元格转文本，整数值的浮点数去掉小数部分
pub fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// 报告期间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodFilter {
    /// 指定年月内的日区间（含两端）
    MonthRange {
        year: i32,
        month: u32,
        day_start: u32,
        day_end: u32,
    },
    /// 任意日期区间（含两端）
    DateRange { start: NaiveDate, end: NaiveDate },
}

impl PeriodFilter {
    pub const DEFAULT_WINDOW_DAYS: u32 = 15;

    /// 从参考日期起向后 `days` 天；结束日期超出日历范围时返回错误
    pub fn next_days(reference: NaiveDate, days: u32) -> Result<Self> {
        let end = reference
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| {
                ReportError::InvalidPeriod(format!(
                    "window of {days} days from {reference} is out of range"
                ))
            })?;
        Ok(Self::DateRange {
            start: reference,
            end,
        })
    }

    /// 只拒绝不可能的参数；倒置的区间合法，只是匹配不到任何行
    pub fn validate(&self) -> Result<()> {
        if let Self::MonthRange {
            month,
            day_start,
            day_end,
            ..
        } = *self
        {
            if !(1..=12).contains(&month) {
                return Err(ReportError::InvalidPeriod(format!(
                    "month must be within 1..=12, got {month}"
                )));
            }
            for day in [day_start, day_end] {
                if !(1..=31).contains(&day) {
                    return Err(ReportError::InvalidPeriod(format!(
                        "day must be within 1..=31, got {day}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            Self::MonthRange {
                year,
                month,
                day_start,
                day_end,
            } => {
                date.year() == year
                    && date.month() == month
                    && (day_start..=day_end).contains(&date.day())
            }
            Self::DateRange { start, end } => start <= date && date <= end,
        }
    }

    /// 文件名中的期间标记：`MM_YYYY` 或 ISO 起始日期
    pub fn tag(&self) -> String {
        match *self {
            Self::MonthRange { year, month, .. } => format!("{month:02}_{year}"),
            Self::DateRange { start, .. } => start.format("%Y-%m-%d").to_string(),
        }
    }

    /// 期间的第一天；日区间起点不存在时（如 2 月 30 日）退回当月 1 日
    pub fn first_day(&self) -> Option<NaiveDate> {
        match *self {
            Self::MonthRange {
                year,
                month,
                day_start,
                ..
            } => NaiveDate::from_ymd_opt(year, month, day_start)
                .or_else(|| NaiveDate::from_ymd_opt(year, month, 1)),
            Self::DateRange { start, .. } => Some(start),
        }
    }
}

/// 某个业务员的预约子集，借用表中的行
#[derive(Debug, Clone)]
pub struct SalespersonGroup<'a> {
    /// 原样的业务员名称；None 表示隐式分组（无业务员列或单元格为空）
    pub salesperson: Option<String>,
    pub rows: Vec<&'a Appointment>,
}

/// 报告表格中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub date: NaiveDate,
    /// 缺失时为空串
    pub reason: String,
    /// 缺失或无地址列时为 None，渲染为占位文字
    pub address: Option<String>,
}

/// 生成的报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub salesperson: Option<String>,
    pub appointments: usize,
}

/// 单个分组生成失败
#[derive(Debug, Clone, Serialize)]
pub struct RenderFailure {
    pub salesperson: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// 单个分组失败不影响其他分组
    #[default]
    BestEffort,
    /// 任一分组失败即删除本次已生成的文件并返回错误
    AllOrNothing,
}

/// 一次生成请求
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub source: PathBuf,
    pub logo: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub period: PeriodFilter,
    /// 目标业务员，空表示全部
    pub salespeople: Vec<String>,
    pub language: Language,
    pub mode: GenerationMode,
}

/// 处理结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportOutcome {
    pub reports: Vec<GeneratedReport>,
    pub failures: Vec<RenderFailure>,
    pub rejected_rows: Vec<RejectedRow>,
    /// 期间过滤后的行数（业务员筛选前）
    pub matched_rows: usize,
}

impl ReportOutcome {
    /// 没有任何报告也没有失败：正常的“无结果”
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.failures.is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.reports.iter().map(|r| r.path.clone()).collect()
    }
}

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 输出路径
    pub output_path: String,
    /// Logo 图片路径
    pub logo_path: Option<String>,
    /// 默认目标业务员
    pub salespeople: Vec<String>,
    pub language: Language,
    /// 滚动窗口天数
    pub window_days: u32,
    pub all_or_nothing: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_path: "rapports".to_string(),
            logo_path: None,
            salespeople: ["Sandra", "Ophélie", "Arthur", "Grégoire", "Tania"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            language: Language::French,
            window_days: PeriodFilter::DEFAULT_WINDOW_DAYS,
            all_or_nothing: false,
        }
    }
}

impl AppConfig {
    pub fn generation_mode(&self) -> GenerationMode {
        if self.all_or_nothing {
            GenerationMode::AllOrNothing
        } else {
            GenerationMode::BestEffort
        }
    }
}
