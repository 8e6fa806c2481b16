//! ledger-omr CLI: scan answer-sheet photos, write templates and render
//! synthetic sheets.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use ledger_omr::core::{GridLayout, Template};
use ledger_omr::grade::{AnswerKey, DetectedAnswers, MarkingScheme};
use ledger_omr::io::{ScanConfig, ScanReport};
use ledger_omr::synthetic::{keystone_corners, project_sheet, render_enrollment, render_sheet, RenderStyle};
use ledger_omr::{detect, ScanParams};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ledger-omr")]
#[command(about = "Scan and grade OMR answer sheets")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan one sheet image and write a JSON report.
    Scan(ScanArgs),
    /// Write a regular-layout template as JSON.
    Template(TemplateArgs),
    /// Draw a synthetic sheet as PNG.
    Render(RenderArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Scan job config (JSON); replaces the individual flags below.
    #[arg(long, conflicts_with_all = ["template", "image"])]
    config: Option<PathBuf>,

    /// Template JSON.
    #[arg(long, required_unless_present = "config")]
    template: Option<PathBuf>,

    /// Sheet image (any format the `image` crate decodes).
    #[arg(long, required_unless_present = "config")]
    image: Option<PathBuf>,

    /// Answer key JSON: an object from 0-based question index to option index.
    #[arg(long)]
    key: Option<PathBuf>,

    /// Marks for a correct answer.
    #[arg(long, default_value = "1.0")]
    correct: f64,

    /// Marks deducted for a wrong answer when negative marking is on.
    #[arg(long, default_value = "0.0")]
    wrong: f64,

    #[arg(long)]
    negative: bool,

    /// Scan parameters JSON; missing fields take their defaults.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Report path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct TemplateArgs {
    #[arg(long, default_value = "20")]
    questions: usize,

    #[arg(long, default_value = "4")]
    options: usize,

    /// Enrollment digit columns; 0 for none.
    #[arg(long, default_value = "0")]
    enrollment: usize,

    #[arg(long)]
    name: Option<String>,

    /// Full layout JSON; overrides the flags above.
    #[arg(long)]
    layout: Option<PathBuf>,

    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct RenderArgs {
    #[arg(long)]
    template: PathBuf,

    /// Filled options, e.g. `0:1,3:0,5:2+3` (0-based question:option).
    #[arg(long, default_value = "")]
    answers: String,

    /// Enrollment number to fill in.
    #[arg(long)]
    enrollment: Option<String>,

    #[arg(long, default_value = "1.0")]
    scale: f32,

    /// Shorten the top edge by this fraction to imitate a tilted camera.
    #[arg(long)]
    keystone: Option<f32>,

    /// Border around the projected sheet, in output pixels.
    #[arg(long, default_value = "40")]
    margin: f32,

    #[arg(long)]
    out: PathBuf,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level)?;

    match cli.command {
        Commands::Scan(args) => run_scan(&args),
        Commands::Template(args) => run_template(&args),
        Commands::Render(args) => run_render(&args),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(level: LevelFilter) -> CliResult<()> {
    let _ = tracing_log::LogTracer::init();
    let directive = level.to_string().to_lowercase();
    ledger_omr::core::init_tracing(ledger_omr::core::LogFormat::Text, &directive);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter) -> CliResult<()> {
    ledger_omr::core::init_with_level(level)?;
    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("failed to read {}: {e}", path.display()).into() })?;
    Ok(serde_json::from_str(&raw)?)
}

fn scan_config(args: &ScanArgs) -> CliResult<ScanConfig> {
    if let Some(path) = &args.config {
        return Ok(ScanConfig::load_json(path)?);
    }
    let (Some(template), Some(image)) = (&args.template, &args.image) else {
        return Err("--template and --image are required without --config".into());
    };
    let params: ScanParams = match &args.params {
        Some(p) => load_json(p)?,
        None => ScanParams::default(),
    };
    let answer_key: Option<AnswerKey> = args.key.as_deref().map(load_json).transpose()?;
    Ok(ScanConfig {
        template_path: template.to_string_lossy().into_owned(),
        image_path: image.to_string_lossy().into_owned(),
        answer_key,
        marking_scheme: Some(MarkingScheme::new(args.correct, args.wrong, args.negative)?),
        passing_percentage: None,
        grade_scale: None,
        params,
        output_path: args.out.as_ref().map(|p| p.to_string_lossy().into_owned()),
    })
}

fn run_scan(args: &ScanArgs) -> CliResult<()> {
    let cfg = scan_config(args)?;
    let scanner = cfg.build_scanner()?;
    let img = detect::load_upright_image(&cfg.image_path)?;
    log::info!("scanning {} ({}x{})", cfg.image_path, img.width(), img.height());

    let mut report = ScanReport::new(&cfg, img.width() as usize, img.height() as usize);
    let outcome = detect::scan_gray_image(&scanner, &img);
    match &outcome {
        Ok(scan) => {
            let sheet = match &cfg.answer_key {
                Some(key) => scan.evaluate_with(&cfg.evaluator(scan.total_questions)?, key),
                None => scan.report(),
            };
            report.set_sheet(sheet);
        }
        Err(err) => {
            log::warn!("scan failed: {err}");
            report.set_error(err);
        }
    }

    match (&args.out, &cfg.output_path) {
        (Some(path), _) => report.write_json(path)?,
        (None, Some(path)) if args.config.is_some() => report.write_json(path)?,
        _ => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    match outcome {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("{err} ({})", err.guidance()).into()),
    }
}

fn run_template(args: &TemplateArgs) -> CliResult<()> {
    let layout = match &args.layout {
        Some(path) => load_json::<GridLayout>(path)?,
        None => {
            let mut layout =
                GridLayout::new(args.questions, args.options).with_enrollment(args.enrollment);
            if let Some(name) = &args.name {
                layout = layout.with_name(name.clone());
            }
            layout
        }
    };
    let template = layout.build()?;
    template.write_json(&args.out)?;
    log::info!(
        "wrote {} question template to {}",
        template.total_questions(),
        args.out.display()
    );
    Ok(())
}

fn parse_answers(list: &str) -> CliResult<DetectedAnswers> {
    let mut answers = DetectedAnswers::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((q, opts)) = item.split_once(':') else {
            return Err(format!("expected question:option, got `{item}`").into());
        };
        let q: usize = q.trim().parse()?;
        let opts = opts
            .split('+')
            .map(|o| o.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()?;
        answers.entry(q).or_default().extend(opts);
    }
    Ok(answers)
}

fn run_render(args: &RenderArgs) -> CliResult<()> {
    let template = Template::load_json(&args.template)?;
    let answers = parse_answers(&args.answers)?;
    let style = RenderStyle {
        scale: args.scale,
        ..RenderStyle::default()
    };

    let mut sheet = render_sheet(&template, &answers, &style);
    if let Some(number) = &args.enrollment {
        render_enrollment(&mut sheet, &template, number, &style);
    }

    let out = match args.keystone {
        Some(k) => {
            let margin = args.margin.max(0.0);
            let w = sheet.width + 2 * margin.ceil() as usize;
            let h = sheet.height + 2 * margin.ceil() as usize;
            let corners = keystone_corners(w, h, margin, k);
            let (frame, _) = project_sheet(&sheet, &corners, w, h, style.paper / 2)
                .ok_or("keystone produced a degenerate projection")?;
            frame
        }
        None => sheet,
    };

    detect::to_gray_image(&out)?.save(&args.out)?;
    log::info!("wrote {}x{} sheet to {}", out.width, out.height, args.out.display());
    Ok(())
}
