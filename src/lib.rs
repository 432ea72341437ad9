pub mod data_processor;
pub mod error;
pub mod excel_parser;
pub mod locale;
pub mod models;
pub mod normalize;
pub mod report_generator;
pub mod schema;

#[cfg(test)]
mod test_support;

use crate::data_processor::{collect_groups, report_lines};
use crate::error::{ReportError, Result};
use crate::excel_parser::load_appointments;
use crate::models::{AppConfig, GenerationMode, RenderFailure, ReportOutcome, ReportRequest};
use crate::report_generator::{ensure_writable, render_report, ReportContext};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub use locale::Language;
pub use models::{GeneratedReport, PeriodFilter};

const CONFIG_FILE: &str = "config.json";

/// 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rdv_reports")
        .join(CONFIG_FILE)
}

/// 加载配置，文件不存在或损坏时使用默认值
pub fn load_config() -> AppConfig {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> AppConfig {
    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
                Ok(config) => return config,
                Err(e) => warn!(path = %config_path.display(), error = %e, "invalid config, using defaults"),
            },
            Err(e) => warn!(path = %config_path.display(), error = %e, "cannot read config, using defaults"),
        }
    }
    AppConfig::default()
}

/// 保存配置
pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let config_path = get_config_path();
    save_config_to(config, &config_path)?;
    Ok(config_path)
}

pub fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<()> {
    // 创建配置目录
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))?;
    }

    // 序列化并保存
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ReportError::Config(format!("cannot serialize config: {e}")))?;

    fs::write(config_path, content).map_err(|e| ReportError::io(config_path, e))?;

    Ok(())
}

/// 加载表格、过滤、分组并为每个业务员生成报告
///
/// 结构性错误（缺少年/月/日列、源文件不可读、输出目录不可写）在写任何文件之前返回。
/// 没有匹配的预约时返回空结果而不是错误。
pub fn generate_reports(request: &ReportRequest) -> Result<ReportOutcome> {
    request.period.validate()?;

    info!(source = %request.source.display(), period = ?request.period, "generating reports");

    let table = load_appointments(&request.source)?;
    let (matched_rows, groups) = collect_groups(&table, &request.period, &request.salespeople);

    let mut outcome = ReportOutcome {
        reports: Vec::new(),
        failures: Vec::new(),
        rejected_rows: table.rejected.clone(),
        matched_rows,
    };

    if groups.is_empty() {
        warn!(matched_rows, "no appointments match the criteria");
        return Ok(outcome);
    }

    // 创建输出目录；已存在但不可写时同样是结构性错误
    fs::create_dir_all(&request.output_dir).map_err(|e| ReportError::io(&request.output_dir, e))?;
    ensure_writable(&request.output_dir)?;

    let ctx = ReportContext {
        period: &request.period,
        logo: request.logo.as_deref(),
        output_dir: &request.output_dir,
        language: request.language,
    };

    for group in &groups {
        let lines = report_lines(&table, group);
        let salesperson = group.salesperson.as_deref();

        match render_report(salesperson, &lines, &ctx) {
            Ok(report) => outcome.reports.push(report),
            Err(e) => {
                let name = salesperson
                    .unwrap_or(request.language.labels().all_salespeople)
                    .to_string();
                error!(salesperson = %name, error = %e, "report generation failed");

                if request.mode == GenerationMode::AllOrNothing {
                    discard_reports(&outcome.reports);
                    return Err(ReportError::Render {
                        salesperson: name,
                        source: Box::new(e),
                    });
                }

                outcome.failures.push(RenderFailure {
                    salesperson: group.salesperson.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        generated = outcome.reports.len(),
        failed = outcome.failures.len(),
        rejected_rows = outcome.rejected_rows.len(),
        "report generation finished"
    );

    Ok(outcome)
}

/// 全有或全无模式下撤销本次已生成的文件
fn discard_reports(reports: &[GeneratedReport]) {
    for report in reports {
        if let Err(e) = fs::remove_file(&report.path) {
            warn!(file = %report.path.display(), error = %e, "cannot remove report");
        }
    }
}
