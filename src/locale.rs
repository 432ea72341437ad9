use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::PeriodFilter;
use crate::normalize::normalize_text;

const MONTHS_FR: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// 报告语言，显式传入而不依赖进程 locale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    #[value(name = "fr")]
    French,
    #[value(name = "en")]
    English,
}

/// 文档中的固定文字
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub cover_sheet: &'static str,
    pub appointments_sheet: &'static str,
    pub title: &'static str,
    pub salesperson: &'static str,
    pub period: &'static str,
    pub heading: &'static str,
    pub col_date: &'static str,
    pub col_reason: &'static str,
    pub col_address: &'static str,
    pub no_appointments: &'static str,
    pub not_specified: &'static str,
    pub all_salespeople: &'static str,
    pub running_header: &'static str,
    pub appointments_of: &'static str,
    pub nothing_found: &'static str,
}

const LABELS_FR: Labels = Labels {
    cover_sheet: "Page de garde",
    appointments_sheet: "Rendez-vous",
    title: "RAPPORT RDV COMMERCIAL",
    salesperson: "Commercial :",
    period: "Période :",
    heading: "Rendez-vous",
    col_date: "Date",
    col_reason: "Raison du RDV",
    col_address: "Adresse",
    no_appointments: "Aucun rendez-vous trouvé pour cette période.",
    not_specified: "Non spécifié",
    all_salespeople: "Tous les commerciaux",
    running_header: "Compte rendu",
    appointments_of: "RDV de",
    nothing_found: "Aucun RDV trouvé pour ces critères.",
};

const LABELS_EN: Labels = Labels {
    cover_sheet: "Cover",
    appointments_sheet: "Appointments",
    title: "SALES APPOINTMENT REPORT",
    salesperson: "Salesperson:",
    period: "Period:",
    heading: "Appointments",
    col_date: "Date",
    col_reason: "Reason",
    col_address: "Address",
    no_appointments: "No appointments found for this period.",
    not_specified: "Not specified",
    all_salespeople: "All salespeople",
    running_header: "Report",
    appointments_of: "appointments of",
    nothing_found: "No appointments found for these criteria.",
};

impl Language {
    pub fn labels(&self) -> &'static Labels {
        match self {
            Self::French => &LABELS_FR,
            Self::English => &LABELS_EN,
        }
    }

    /// 月份名称，`month` 超出 1..=12 时返回空串
    pub fn month_name(&self, month: u32) -> &'static str {
        let table = match self {
            Self::French => &MONTHS_FR,
            Self::English => &MONTHS_EN,
        };
        month
            .checked_sub(1)
            .and_then(|i| table.get(i as usize))
            .copied()
            .unwrap_or("")
    }

    fn connectors(&self) -> (&'static str, &'static str) {
        match self {
            Self::French => ("du", "au"),
            Self::English => ("from", "to"),
        }
    }

    fn long_date(&self, date: NaiveDate) -> String {
        format!(
            "{} {} {}",
            date.day(),
            self.month_name(date.month()),
            date.year()
        )
    }

    /// 期间说明，只由期间参数决定
    ///
    /// 月份区间："du 1 au 15 mars 2024"；日期区间："du 1 mars 2024 au 16 mars 2024"
    pub fn period_caption(&self, period: &PeriodFilter) -> String {
        let (from, to) = self.connectors();
        match *period {
            PeriodFilter::MonthRange {
                year,
                month,
                day_start,
                day_end,
            } => format!(
                "{from} {day_start} {to} {day_end} {} {year}",
                self.month_name(month)
            ),
            PeriodFilter::DateRange { start, end } => format!(
                "{from} {} {to} {}",
                self.long_date(start),
                self.long_date(end)
            ),
        }
    }
}

/// 按法语或英语月份名解析，忽略大小写和重音
pub fn month_from_name(name: &str) -> Option<u32> {
    let wanted = normalize_text(name.trim());
    if wanted.is_empty() {
        return None;
    }
    MONTHS_FR
        .iter()
        .position(|m| normalize_text(m) == wanted)
        .or_else(|| MONTHS_EN.iter().position(|m| normalize_text(m) == wanted))
        .map(|i| i as u32 + 1)
}
