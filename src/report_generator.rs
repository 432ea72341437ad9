use crate::error::{ReportError, Result};
use crate::locale::Language;
use crate::models::{GeneratedReport, PeriodFilter, ReportLine};
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// 封面 logo 显示宽度（像素，96 dpi 下 2 英寸）
const COVER_LOGO_WIDTH: f64 = 192.0;
/// 页眉 logo 显示宽度（1.5 英寸）
const HEADER_LOGO_WIDTH: f64 = 144.0;
/// 默认行高（像素）
const ROW_HEIGHT_PX: f64 = 20.0;
/// Excel 页眉最多 255 个字符（转义后计），留出控制码的余量
const HEADER_TEXT_MAX: usize = 200;

static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s").expect("valid regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/\\]").expect("valid regex"));

/// 渲染所需的期间、logo、输出目录和语言
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub period: &'a PeriodFilter,
    pub logo: Option<&'a Path>,
    pub output_dir: &'a Path,
    pub language: Language,
}

/// 文件名清理：空白换成 `_`，路径分隔符换成 `-`
pub fn sanitize_filename(name: &str) -> String {
    let name = SPACES.replace_all(name, "_");
    SEPARATORS.replace_all(&name, "-").into_owned()
}

/// `RDV_<业务员>_<期间标记>.xlsx`；隐式分组没有业务员段，不会与任何名字重名
pub fn report_file_name(salesperson: Option<&str>, period: &PeriodFilter) -> String {
    match salesperson {
        Some(name) => format!("RDV_{}_{}.xlsx", sanitize_filename(name), period.tag()),
        None => format!("RDV_{}.xlsx", period.tag()),
    }
}

/// 确认输出目录可写：在其中创建并立即删除一个临时文件
pub fn ensure_writable(dir: &Path) -> Result<()> {
    NamedTempFile::new_in(dir)
        .and_then(NamedTempFile::close)
        .map_err(|e| ReportError::io(dir, e))
}

/// 生成一个业务员的报告
///
/// 文件先写入输出目录中的临时文件，完成后再改名，失败时不会留下目标文件。
pub fn render_report(
    salesperson: Option<&str>,
    lines: &[ReportLine],
    ctx: &ReportContext<'_>,
) -> Result<GeneratedReport> {
    fs::create_dir_all(ctx.output_dir).map_err(|e| ReportError::io(ctx.output_dir, e))?;

    let path = ctx
        .output_dir
        .join(report_file_name(salesperson, ctx.period));

    let mut workbook = build_workbook(salesperson, lines, ctx)?;
    let buffer = workbook.save_to_buffer()?;
    write_atomically(&path, &buffer)?;

    info!(
        file = %path.display(),
        appointments = lines.len(),
        "report written"
    );

    Ok(GeneratedReport {
        path,
        salesperson: salesperson.map(str::to_string),
        appointments: lines.len(),
    })
}

/// 组装工作簿：封面 + 预约表
pub fn build_workbook(
    salesperson: Option<&str>,
    lines: &[ReportLine],
    ctx: &ReportContext<'_>,
) -> Result<Workbook> {
    let labels = ctx.language.labels();
    let name = salesperson.unwrap_or(labels.all_salespeople);
    let caption = ctx.language.period_caption(ctx.period);
    let logo = ctx.logo.and_then(load_logo);

    let mut workbook = Workbook::new();

    // 文档属性中的创建时间固定为期间首日，相同输入得到相同文件
    let mut properties = DocProperties::new().set_title(&format!("{} - {}", labels.title, name));
    if let Some(created) = creation_datetime(ctx.period) {
        properties = properties.set_creation_datetime(&created);
    }
    workbook.set_properties(&properties);

    // 标题格式
    let title_format = Format::new()
        .set_font_size(24)
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);

    let label_format = Format::new().set_font_size(12).set_bold();
    let value_format = Format::new().set_font_size(12);

    let heading_format = Format::new().set_font_size(16).set_bold();

    let header_format = Format::new()
        .set_font_size(11)
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_background_color(Color::RGB(0xD9E1F2))
        .set_border(FormatBorder::Thin);

    let cell_format = Format::new()
        .set_font_size(10)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin);

    let date_format = Format::new()
        .set_font_size(10)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin);

    let note_format = Format::new().set_font_size(11).set_italic();

    // 封面
    let cover = workbook.add_worksheet();
    cover.set_name(labels.cover_sheet)?;
    cover.set_paper_size(9);
    cover.set_column_width(0, 16)?;
    cover.set_column_width(1, 60)?;

    let mut row = 0u32;
    if let Some(image) = &logo {
        let (scaled, height) = scale_to_width(image, COVER_LOGO_WIDTH);
        cover.insert_image(0, 0, &scaled)?;
        row = (height / ROW_HEIGHT_PX).ceil() as u32 + 1;
    }

    cover.merge_range(row, 0, row, 3, labels.title, &title_format)?;
    cover.set_row_height(row, 36)?;

    cover.write_string_with_format(row + 2, 0, labels.salesperson, &label_format)?;
    cover.write_string_with_format(row + 2, 1, name, &value_format)?;
    cover.write_string_with_format(row + 3, 0, labels.period, &label_format)?;
    cover.write_string_with_format(row + 3, 1, &caption, &value_format)?;

    // 预约表
    let sheet = workbook.add_worksheet();
    sheet.set_name(labels.appointments_sheet)?;
    sheet.set_paper_size(9);
    sheet.set_column_width(0, 14)?;
    sheet.set_column_width(1, 40)?;
    sheet.set_column_width(2, 50)?;

    // 页眉
    let header_text = escape_header(&format!(
        "{} {} – {} {}",
        labels.running_header, caption, labels.appointments_of, name
    ));
    match &logo {
        Some(image) => {
            let (scaled, _) = scale_to_width(image, HEADER_LOGO_WIDTH);
            sheet.set_header(&format!("&L&[Picture]&R{header_text}"));
            sheet.set_header_image(&scaled, HeaderImagePosition::Left)?;
        }
        None => {
            sheet.set_header(&format!("&R{header_text}"));
        }
    }

    sheet.write_string_with_format(0, 0, labels.heading, &heading_format)?;

    if lines.is_empty() {
        sheet.write_string_with_format(2, 0, labels.no_appointments, &note_format)?;
        return Ok(workbook);
    }

    // 表头（第3行）
    let headers = [labels.col_date, labels.col_reason, labels.col_address];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(2, col as u16, *header, &header_format)?;
    }
    sheet.set_repeat_rows(2, 2)?;

    // 数据行（从第4行开始），保持输入顺序
    for (idx, line) in lines.iter().enumerate() {
        let row = (idx + 3) as u32;
        let date_str = line.date.format("%d/%m/%Y").to_string();
        let address = line.address.as_deref().unwrap_or(labels.not_specified);

        sheet.write_string_with_format(row, 0, &date_str, &date_format)?;
        sheet.write_string_with_format(row, 1, &line.reason, &cell_format)?;
        sheet.write_string_with_format(row, 2, address, &cell_format)?;
    }

    Ok(workbook)
}

/// 读取 logo；不存在或无法识别时只记录警告
fn load_logo(path: &Path) -> Option<Image> {
    if !path.is_file() {
        warn!(logo = %path.display(), "logo not found, rendering without it");
        return None;
    }
    match Image::new(path) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(logo = %path.display(), error = %e, "logo unreadable, rendering without it");
            None
        }
    }
}

/// 按目标宽度等比缩放，返回缩放后的图片和显示高度
fn scale_to_width(image: &Image, width: f64) -> (Image, f64) {
    let scale = if image.width() > 0.0 {
        width / image.width()
    } else {
        1.0
    };
    let scaled = image
        .clone()
        .set_scale_width(scale)
        .set_scale_height(scale);
    (scaled, image.height() * scale)
}

fn creation_datetime(period: &PeriodFilter) -> Option<ExcelDateTime> {
    let day = period.first_day()?;
    let year = u16::try_from(day.year()).ok()?;
    ExcelDateTime::from_ymd(year, day.month() as u8, day.day() as u8).ok()
}

/// 页眉中 `&` 是控制符，需要转义；先转义再截断，且不拆开 `&&`
fn escape_header(text: &str) -> String {
    let mut escaped = String::new();
    let mut count = 0;
    for c in text.chars() {
        let width = if c == '&' { 2 } else { 1 };
        if count + width > HEADER_TEXT_MAX {
            break;
        }
        if c == '&' {
            escaped.push_str("&&");
        } else {
            escaped.push(c);
        }
        count += width;
    }
    escaped
}

/// 写入同目录临时文件后改名
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir: PathBuf = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| ReportError::io(&dir, e))?;
    tmp.write_all(bytes).map_err(|e| ReportError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ReportError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| ReportError::io(path, e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TINY_PNG;
    use calamine::{open_workbook_auto, Data, Range, Reader};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn march() -> PeriodFilter {
        PeriodFilter::MonthRange {
            year: 2024,
            month: 3,
            day_start: 1,
            day_end: 15,
        }
    }

    fn line(d: u32, reason: &str, address: Option<&str>) -> ReportLine {
        ReportLine {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            reason: reason.to_string(),
            address: address.map(str::to_string),
        }
    }

    fn read_sheet(path: &Path, sheet: &str) -> Range<Data> {
        let mut workbook = open_workbook_auto(path).unwrap();
        workbook.worksheet_range(sheet).unwrap()
    }

    fn cells(range: &Range<Data>) -> Vec<Vec<Data>> {
        range.rows().map(|r| r.to_vec()).collect()
    }

    fn text(range: &Range<Data>, row: u32, col: u32) -> String {
        range
            .get_value((row, col))
            .map(|c| c.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Jean Paul"), "Jean_Paul");
        assert_eq!(sanitize_filename("A/B\\C"), "A-B-C");
        assert_eq!(sanitize_filename("Ophélie"), "Ophélie");
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name(Some("Marie Claire"), &march()),
            "RDV_Marie_Claire_03_2024.xlsx"
        );
        let window = PeriodFilter::next_days(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 15).unwrap();
        assert_eq!(report_file_name(None, &window), "RDV_2024-03-01.xlsx");
        // 名为 ALL 的业务员与隐式分组互不覆盖
        assert_ne!(
            report_file_name(Some("ALL"), &march()),
            report_file_name(None, &march())
        );
    }

    #[test]
    fn test_escape_header() {
        assert_eq!(escape_header("R&D"), "R&&D");
        assert_eq!(escape_header(&"x".repeat(500)).len(), HEADER_TEXT_MAX);

        let ampersands = escape_header(&"&".repeat(150));
        assert_eq!(ampersands.len(), HEADER_TEXT_MAX);
        assert!(ampersands.chars().all(|c| c == '&'));

        // 奇数余量时不留下半个 `&&`
        let odd = escape_header(&format!("x{}", "&".repeat(150)));
        assert_eq!(odd.len(), HEADER_TEXT_MAX - 1);
        assert_eq!(odd.matches('&').count() % 2, 0);
    }

    #[test]
    fn test_render_report_with_long_ampersand_name() {
        let dir = TempDir::new().unwrap();
        let period = march();
        let ctx = ReportContext {
            period: &period,
            logo: None,
            output_dir: dir.path(),
            language: Language::French,
        };
        let name = "&".repeat(150);
        let header = escape_header(&format!(
            "Compte rendu {} – RDV de {}",
            Language::French.period_caption(&period),
            name
        ));
        assert!(format!("&R{header}").chars().count() <= 255);

        let report = render_report(Some(&name), &[line(4, "Visite", None)], &ctx).unwrap();
        let cover = read_sheet(&report.path, "Page de garde");
        assert_eq!(text(&cover, 2, 1), name);
    }

    #[test]
    fn test_ensure_writable() {
        let dir = TempDir::new().unwrap();
        ensure_writable(dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        let missing = dir.path().join("absent");
        let err = ensure_writable(&missing).unwrap_err();
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn test_render_report_writes_table_in_input_order() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("rapports");
        let period = march();
        let ctx = ReportContext {
            period: &period,
            logo: None,
            output_dir: &out,
            language: Language::French,
        };
        let lines = vec![
            line(10, "Signature", Some("5 rue Haute")),
            line(2, "Démo", None),
        ];

        let report = render_report(Some("Sandra"), &lines, &ctx).unwrap();
        assert_eq!(report.path, out.join("RDV_Sandra_03_2024.xlsx"));
        assert_eq!(report.appointments, 2);
        assert!(report.path.is_file());

        let cover = read_sheet(&report.path, "Page de garde");
        assert_eq!(text(&cover, 0, 0), "RAPPORT RDV COMMERCIAL");
        assert_eq!(text(&cover, 2, 1), "Sandra");
        assert_eq!(text(&cover, 3, 1), "du 1 au 15 mars 2024");

        let table = read_sheet(&report.path, "Rendez-vous");
        assert_eq!(text(&table, 2, 0), "Date");
        assert_eq!(text(&table, 2, 1), "Raison du RDV");
        assert_eq!(text(&table, 2, 2), "Adresse");
        assert_eq!(text(&table, 3, 0), "10/03/2024");
        assert_eq!(text(&table, 3, 2), "5 rue Haute");
        assert_eq!(text(&table, 4, 0), "02/03/2024");
        assert_eq!(text(&table, 4, 1), "Démo");
        assert_eq!(text(&table, 4, 2), "Non spécifié");
        assert_eq!(text(&table, 5, 0), "");
    }

    #[test]
    fn test_render_report_english_placeholder() {
        let dir = TempDir::new().unwrap();
        let period = march();
        let ctx = ReportContext {
            period: &period,
            logo: None,
            output_dir: dir.path(),
            language: Language::English,
        };
        let report = render_report(Some("Arthur"), &[line(3, "", None)], &ctx).unwrap();
        let table = read_sheet(&report.path, "Appointments");
        assert_eq!(text(&table, 3, 1), "");
        assert_eq!(text(&table, 3, 2), "Not specified");
    }

    #[test]
    fn test_render_report_without_lines_writes_note() {
        let dir = TempDir::new().unwrap();
        let period = march();
        let ctx = ReportContext {
            period: &period,
            logo: None,
            output_dir: dir.path(),
            language: Language::French,
        };
        let report = render_report(None, &[], &ctx).unwrap();
        assert!(report.path.ends_with("RDV_03_2024.xlsx"));
        let table = read_sheet(&report.path, "Rendez-vous");
        assert_eq!(
            text(&table, 2, 0),
            "Aucun rendez-vous trouvé pour cette période."
        );
        let cover = read_sheet(&report.path, "Page de garde");
        assert_eq!(text(&cover, 2, 1), "Tous les commerciaux");
    }

    #[test]
    fn test_render_report_with_logo_and_missing_logo() {
        let dir = TempDir::new().unwrap();
        let logo = dir.path().join("logo.png");
        fs::write(&logo, TINY_PNG).unwrap();
        let period = march();

        let with_logo = ReportContext {
            period: &period,
            logo: Some(&logo),
            output_dir: &dir.path().join("a"),
            language: Language::French,
        };
        let report = render_report(Some("Tania"), &[line(4, "Visite", None)], &with_logo).unwrap();
        let cover = read_sheet(&report.path, "Page de garde");
        let title_row = (1.0 * COVER_LOGO_WIDTH / ROW_HEIGHT_PX).ceil() as u32 + 1;
        assert_eq!(text(&cover, title_row, 0), "RAPPORT RDV COMMERCIAL");

        let missing = dir.path().join("absent.png");
        let without_logo = ReportContext {
            period: &period,
            logo: Some(&missing),
            output_dir: &dir.path().join("b"),
            language: Language::French,
        };
        let report = render_report(Some("Tania"), &[line(4, "Visite", None)], &without_logo).unwrap();
        let cover = read_sheet(&report.path, "Page de garde");
        assert_eq!(text(&cover, 0, 0), "RAPPORT RDV COMMERCIAL");
    }

    #[test]
    fn test_render_report_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let period = march();
        let lines = vec![line(2, "Démo", Some("1 rue A")), line(9, "Relance", None)];
        let first = ReportContext {
            period: &period,
            logo: None,
            output_dir: &dir.path().join("first"),
            language: Language::French,
        };
        let second = ReportContext {
            output_dir: &dir.path().join("second"),
            ..first
        };

        let a = render_report(Some("Sandra"), &lines, &first).unwrap();
        let b = render_report(Some("Sandra"), &lines, &second).unwrap();
        assert_eq!(a.path.file_name(), b.path.file_name());
        for sheet in ["Page de garde", "Rendez-vous"] {
            assert_eq!(cells(&read_sheet(&a.path, sheet)), cells(&read_sheet(&b.path, sheet)));
        }

        // 同一目录重复生成会覆盖原文件
        let again = render_report(Some("Sandra"), &lines, &first).unwrap();
        assert_eq!(again.path, a.path);
        assert_eq!(
            cells(&read_sheet(&again.path, "Rendez-vous")),
            cells(&read_sheet(&b.path, "Rendez-vous"))
        );
    }

    #[test]
    fn test_render_report_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let period = march();
        let ctx = ReportContext {
            period: &period,
            logo: None,
            output_dir: dir.path(),
            language: Language::French,
        };
        render_report(Some("Sandra"), &[line(2, "Démo", None)], &ctx).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["RDV_Sandra_03_2024.xlsx".to_string()]);
    }
}
