use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rdv_reports::models::{AppConfig, ReportRequest};
use rdv_reports::{generate_reports, load_config, save_config, Language, PeriodFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "rdv-reports",
    version,
    about = "Génère un rapport de rendez-vous par commercial à partir d'un fichier Excel",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    period: PeriodCommand,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum PeriodCommand {
    /// Jours `from..=to` d'un mois donné
    Month {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        /// Jour de début
        #[arg(long = "from", default_value_t = 1)]
        day_start: u32,
        /// Jour de fin
        #[arg(long = "to", default_value_t = 31)]
        day_end: u32,
    },
    /// Fenêtre glissante à partir d'une date de référence
    Window {
        /// Date de référence (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Taille de la fenêtre en jours (défaut : configuration, 15)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Fichier Excel des RDV
    #[arg(long, short, global = true)]
    input: Option<PathBuf>,
    /// Logo (png/jpg), facultatif
    #[arg(long, global = true)]
    logo: Option<PathBuf>,
    /// Dossier de sortie
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,
    /// Commercial à inclure (répétable)
    #[arg(long = "commercial", global = true)]
    salespeople: Vec<String>,
    /// Inclure tous les commerciaux
    #[arg(long, global = true, conflicts_with = "salespeople")]
    all: bool,
    #[arg(long, value_enum, global = true)]
    lang: Option<Language>,
    /// Annuler tous les rapports si l'un d'eux échoue
    #[arg(long, global = true)]
    all_or_nothing: bool,
    /// Enregistrer les options comme configuration par défaut
    #[arg(long, global = true)]
    save_config: bool,
}

fn main() -> ExitCode {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config();
    merge_args(&mut config, &cli.common);

    if cli.common.save_config {
        let path = save_config(&config).context("enregistrement de la configuration")?;
        eprintln!("Configuration enregistrée : {}", path.display());
    }

    let source = cli
        .common
        .input
        .clone()
        .context("--input est obligatoire")?;

    let period = match cli.period {
        PeriodCommand::Month {
            year,
            month,
            day_start,
            day_end,
        } => PeriodFilter::MonthRange {
            year,
            month,
            day_start,
            day_end,
        },
        PeriodCommand::Window { start, days } => {
            PeriodFilter::next_days(start, days.unwrap_or(config.window_days))?
        }
    };

    let request = ReportRequest {
        source,
        logo: config.logo_path.as_ref().map(PathBuf::from),
        output_dir: PathBuf::from(&config.output_path),
        period,
        salespeople: if cli.common.all {
            Vec::new()
        } else {
            config.salespeople.clone()
        },
        language: config.language,
        mode: config.generation_mode(),
    };

    let outcome = generate_reports(&request)
        .with_context(|| format!("génération des rapports depuis {:?}", request.source))?;

    for rejected in &outcome.rejected_rows {
        eprintln!("Ligne {} ignorée : {}", rejected.row_number, rejected.reason);
    }

    if outcome.is_empty() {
        println!("{}", request.language.labels().nothing_found);
        return Ok(ExitCode::SUCCESS);
    }

    for report in &outcome.reports {
        println!("{}", report.path.display());
    }

    for failure in &outcome.failures {
        eprintln!(
            "Échec pour {} : {}",
            failure.salesperson.as_deref().unwrap_or("-"),
            failure.error
        );
    }

    Ok(if outcome.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// 命令行参数覆盖配置
fn merge_args(config: &mut AppConfig, args: &CommonArgs) {
    if let Some(logo) = &args.logo {
        config.logo_path = Some(logo.to_string_lossy().to_string());
    }
    if let Some(output) = &args.output {
        config.output_path = output.to_string_lossy().to_string();
    }
    if !args.salespeople.is_empty() {
        config.salespeople = args.salespeople.clone();
    }
    if let Some(lang) = args.lang {
        config.language = lang;
    }
    if args.all_or_nothing {
        config.all_or_nothing = true;
    }
}
