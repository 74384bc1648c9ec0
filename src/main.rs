use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDateTime;
use clap::Parser;
use clinic_report_pdf::{ReportConfig, ReportRequest, generate_report_file};

/// Render an appointment report for a date range as a paginated PDF table.
#[derive(Parser, Debug)]
#[command(name = "clinic-report-pdf", version, about, long_about = None)]
struct Args {
    /// JSON export of the scheduling tables
    #[arg(long)]
    data: PathBuf,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long)]
    start: String,

    /// Last day of the range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: String,

    /// Report type: "day" or "week"
    #[arg(long = "type")]
    kind: String,

    /// Output file. Defaults to the suggested report filename
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// PNG or JPEG logo for the header band
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Font family for all report text
    #[arg(long)]
    font_family: Option<String>,

    /// Extra font files to register before system fonts are searched
    #[arg(long)]
    font_file: Vec<PathBuf>,

    /// Clinic name shown when there is no logo
    #[arg(long)]
    title: Option<String>,

    /// Fixed generation timestamp (YYYY-MM-DDTHH:MM:SS) for reproducible output
    #[arg(long)]
    generated_at: Option<NaiveDateTime>,

    /// Write uncompressed content streams
    #[arg(long)]
    no_compress: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let request = match ReportRequest::parse(Some(&args.start), Some(&args.end), Some(&args.kind)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let mut config = ReportConfig::default();
    if let Some(family) = &args.font_family {
        config = config.with_font_family(family);
    }
    config.font_files = args.font_file.clone();
    if let Some(title) = args.title {
        config.clinic_name = title;
    }
    if let Some(path) = &args.logo {
        match std::fs::read(path) {
            Ok(bytes) => config.logo = Some(bytes),
            Err(e) => log::warn!("Cannot read logo {}: {e}, using the clinic name instead", path.display()),
        }
    }
    config.generated_at = args.generated_at;
    config.compress = !args.no_compress;

    let output = args.output.unwrap_or_else(|| PathBuf::from(request.filename()));

    match generate_report_file(&args.data, &request, &config, &output) {
        Ok(doc) => {
            println!("{} ({} pages)", output.display(), doc.page_count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
