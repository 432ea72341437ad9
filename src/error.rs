use std::path::PathBuf;
use thiserror::Error;

use crate::schema::ColumnRole;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("missing mandatory column(s): {}", format_roles(.roles))]
    MissingColumns { roles: Vec<ColumnRole> },

    #[error("cannot open workbook {path:?}: {source}")]
    OpenWorkbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {path:?} has no worksheet")]
    EmptyWorkbook { path: PathBuf },

    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("failed to render report for {salesperson}: {source}")]
    Render {
        salesperson: String,
        #[source]
        source: Box<ReportError>,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ReportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_roles(roles: &[ColumnRole]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ReportError>;
