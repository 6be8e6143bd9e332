//! CLI subcommand handlers.

use crate::CleanArgs;
use crate::Commands;
use crate::ConfigAction;
use crate::ExtractArgs;
use pdn_core::config::{self, ExtractionConfig, PipelineConfig};
use pdn_core::orchestrator::{OutcomeStatus, Orchestrator, RunSummary};
use pdn_core::profile::{self, IncomeProfile};
use pdn_core::quality::{self, QualityReport};
use pdn_core::relations::{Corpus, DECLARATIONS, PROCUREMENT};
use serde::Serialize;
use std::path::PathBuf;

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub workspace: PathBuf,
    pub config_file: Option<PathBuf>,
    pub json: bool,
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Extract(args) => {
            let config = load(ctx)?;
            let summary = extract(&DECLARATIONS, &config.declarations, &args).await?;
            emit(ctx, &summary, print_run_summary)
        }
        Commands::Procurement(args) => {
            let config = load(ctx)?;
            let summary = extract(&PROCUREMENT, &config.procurement, &args).await?;
            emit(ctx, &summary, print_run_summary)
        }
        Commands::Clean(args) => {
            let config = load(ctx)?;
            let report = clean(&config, &args).await?;
            emit(ctx, &report, print_quality_report)
        }
        Commands::Run {
            extract: args,
            clean_output,
        } => handle_run(ctx, args, clean_output).await,
        Commands::Profile {
            input,
            top,
            iqr_multiplier,
        } => {
            let mut config = load(ctx)?;
            if let Some(input) = input {
                config.quality.input_dir = input;
            }
            if let Some(top) = top {
                config.profile.top_n = top;
            }
            if let Some(k) = iqr_multiplier {
                config.profile.iqr_multiplier = k;
            }
            config.validate()?;
            let profile = tokio::task::spawn_blocking(move || {
                profile::profile(&config.quality, &config.profile)
            })
            .await??;
            emit(ctx, &profile, print_profile)
        }
        Commands::Probe {
            file,
            sample,
            prefix,
        } => {
            let paths = tokio::task::spawn_blocking(move || {
                pdn_core::probe::probe_file(&file, sample, &prefix)
            })
            .await??;
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&paths)?);
            } else {
                for path in &paths {
                    println!("{path}");
                }
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, ctx),
    }
}

fn load(ctx: &Context) -> anyhow::Result<PipelineConfig> {
    config::load_config(Some(&ctx.workspace), ctx.config_file.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn apply_extract_args(settings: &ExtractionConfig, args: &ExtractArgs) -> ExtractionConfig {
    let mut settings = settings.clone();
    if let Some(input) = &args.input {
        settings.input_dir = input.clone();
    }
    if let Some(output) = &args.output {
        settings.output_dir = output.clone();
    }
    settings.force_reprocess.extend(args.force.iter().cloned());
    if let Some(workers) = args.workers {
        settings.max_workers = workers;
    }
    settings
}

async fn extract(
    corpus: &'static Corpus,
    settings: &ExtractionConfig,
    args: &ExtractArgs,
) -> anyhow::Result<RunSummary> {
    let settings = apply_extract_args(settings, args);
    let section = corpus.kind.to_string();
    let problems = settings.validate(&section);
    if !problems.is_empty() {
        anyhow::bail!("Invalid configuration: {}", problems.join("; "));
    }
    Ok(Orchestrator::new(corpus, settings).run().await?)
}

async fn clean(config: &PipelineConfig, args: &CleanArgs) -> anyhow::Result<QualityReport> {
    let mut settings = config.quality.clone();
    if let Some(input) = &args.input {
        settings.input_dir = input.clone();
    }
    if let Some(output) = &args.output {
        settings.output_dir = output.clone();
    }
    let problems = settings.validate();
    if !problems.is_empty() {
        anyhow::bail!("Invalid configuration: {}", problems.join("; "));
    }
    Ok(tokio::task::spawn_blocking(move || quality::partition(&settings)).await??)
}

#[derive(Serialize)]
struct RunOutput {
    extraction: RunSummary,
    quality: QualityReport,
}

async fn handle_run(
    ctx: &Context,
    args: ExtractArgs,
    clean_output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load(ctx)?;
    let summary = extract(&DECLARATIONS, &config.declarations, &args).await?;
    if summary.failed > 0 {
        tracing::warn!(
            failed = summary.failed,
            "Some jurisdictions failed; classifying the relations that were written"
        );
    }

    // Classification reads what extraction wrote.
    let clean_args = CleanArgs {
        input: Some(summary.output_dir.clone()),
        output: clean_output,
    };
    let report = clean(&config, &clean_args).await?;

    if ctx.json {
        let output = RunOutput {
            extraction: summary,
            quality: report,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_run_summary(&summary);
        println!();
        print_quality_report(&report);
    }
    Ok(())
}

fn handle_config(action: ConfigAction, ctx: &Context) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let config_path = config::workspace_config_path(&ctx.workspace);
            if config_path.exists() && !force {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let path = config::write_default_config(&ctx.workspace, force)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(ctx)?;
            println!("{}", config::render_toml(&config)?);
            Ok(())
        }
    }
}

fn emit<T: Serialize>(ctx: &Context, value: &T, print: fn(&T)) -> anyhow::Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    println!(
        "{} extraction: {} processed, {} skipped ({} already processed, {} without source), {} failed in {:.1}s",
        summary.corpus,
        summary.processed,
        summary.skipped(),
        summary.skipped_already_processed,
        summary.skipped_missing_source,
        summary.failed,
        summary.duration().num_milliseconds() as f64 / 1000.0,
    );
    for outcome in &summary.outcomes {
        match &outcome.status {
            OutcomeStatus::Processed {
                records,
                skipped_entries,
                rows,
                ..
            } => {
                let total: usize = rows.values().sum();
                print!(
                    "  {:<24} processed  {records} records, {total} rows in {} relations",
                    outcome.jurisdiction,
                    rows.len()
                );
                if *skipped_entries > 0 {
                    print!(", {skipped_entries} non-record entries skipped");
                }
                println!();
            }
            OutcomeStatus::Skipped { reason } => {
                println!("  {:<24} skipped    {reason}", outcome.jurisdiction);
            }
            OutcomeStatus::Failed { error } => {
                println!("  {:<24} FAILED     {error}", outcome.jurisdiction);
            }
        }
    }
}

fn print_quality_report(report: &QualityReport) {
    println!("Income quality summary");
    println!("  Total rows:     {}", report.total);
    println!("  Clean rows:     {} ({:.2}%)", report.clean, report.clean_pct);
    println!("  Rejected rows:  {} ({:.2}%)", report.rejected, report.rejected_pct);
    if !report.reasons.is_empty() {
        println!("  Rejections by reason:");
        for reason in &report.reasons {
            println!("    - {}: {}", reason.reason, reason.count);
        }
    }
    println!("  Clean dataset:  {}", report.clean_path.display());
    println!("  Audit log:      {}", report.audit_path.display());
}

fn print_profile(profile: &IncomeProfile) {
    println!(
        "Income profile: {} rows from {} files",
        profile.rows, profile.files
    );
    for field in &profile.fields {
        if !field.present {
            println!("  {}: not present", field.field);
            continue;
        }
        println!(
            "  {}: {} values, {} negative, min {}, max {}, mean {}",
            field.field,
            field.non_null,
            field.negatives,
            fmt_number(field.min),
            fmt_number(field.max),
            fmt_number(field.mean),
        );
        println!(
            "    Q1 {}, Q3 {}, Q3 + {}*IQR = {} ({} above)",
            fmt_number(field.q1),
            fmt_number(field.q3),
            profile.iqr_multiplier,
            fmt_number(field.upper_bound),
            field.above_upper_bound,
        );
    }
    println!(
        "  Rows with 0 < annual < monthly: {}",
        profile.annual_below_monthly
    );
    println!("  Rows per jurisdiction:");
    for entry in &profile.per_jurisdiction {
        println!("    {:<24} {}", entry.jurisdiction, entry.rows);
    }
    if !profile.top_annual.is_empty() {
        println!("  Highest annual incomes:");
        for top in &profile.top_annual {
            println!(
                "    {:>18.2}  {} ({})",
                top.value, top.id, top.jurisdiction
            );
        }
    }
}

fn fmt_number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;

    fn context(dir: &Path) -> Context {
        Context {
            workspace: dir.to_path_buf(),
            config_file: None,
            json: false,
        }
    }

    fn seed_declarations(root: &Path) {
        let dir = root.join("states/Colima");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("completo.json"),
            r#"[
                {"id": "a", "declaracion": {"situacionPatrimonial": {"ingresos": {
                    "ingresoMensualNetoDeclarante": {"valor": 100},
                    "ingresoAnualNetoDeclarante": {"valor": 1200}}}}},
                {"id": "b", "declaracion": {"situacionPatrimonial": {"ingresos": {
                    "ingresoAnualNetoDeclarante": {"valor": -5}}}}}
            ]"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Init { force: false },
        };
        handle_command(command, &context(dir.path())).await.unwrap();

        let config_path = dir.path().join(".pdn").join("config.toml");
        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: PipelineConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.quality.audit_file, "audit_log_ingresos.csv");
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let config_path = dir.path().join(".pdn").join("config.toml");

        handle_command(
            Commands::Config {
                action: ConfigAction::Init { force: false },
            },
            &ctx,
        )
        .await
        .unwrap();
        std::fs::write(&config_path, "[profile]\ntop_n = 3\n").unwrap();

        handle_command(
            Commands::Config {
                action: ConfigAction::Init { force: false },
            },
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "[profile]\ntop_n = 3\n"
        );
    }

    #[tokio::test]
    async fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, &context(dir.path())).await.is_ok());
    }

    #[test]
    fn test_apply_extract_args() {
        let args = ExtractArgs {
            input: Some(PathBuf::from("in")),
            output: None,
            force: vec!["Guerrero".into()],
            workers: Some(4),
        };
        let settings = apply_extract_args(&ExtractionConfig::declarations(), &args);
        assert_eq!(settings.input_dir, PathBuf::from("in"));
        assert_eq!(settings.output_dir, PathBuf::from("csv_outputs"));
        assert_eq!(settings.force_reprocess, vec!["Guerrero".to_string()]);
        assert_eq!(settings.max_workers, 4);
    }

    #[test]
    fn test_flags_win_over_workspace_config() {
        let dir = TempDir::new().unwrap();
        let pdn_dir = dir.path().join(".pdn");
        std::fs::create_dir_all(&pdn_dir).unwrap();
        std::fs::write(
            pdn_dir.join("config.toml"),
            "[declarations]\nmax_workers = 2\nforce_reprocess = [\"Colima\"]\n",
        )
        .unwrap();

        let config = load(&context(dir.path())).unwrap();
        assert_eq!(config.declarations.max_workers, 2);

        let args = ExtractArgs {
            workers: Some(6),
            force: vec!["Sonora".into()],
            ..ExtractArgs::default()
        };
        let settings = apply_extract_args(&config.declarations, &args);
        assert_eq!(settings.max_workers, 6);
        assert_eq!(
            settings.force_reprocess,
            vec!["Colima".to_string(), "Sonora".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_extracts_then_classifies() {
        let dir = TempDir::new().unwrap();
        seed_declarations(dir.path());
        let command = Commands::Run {
            extract: ExtractArgs {
                input: Some(dir.path().join("states")),
                output: Some(dir.path().join("csv_outputs")),
                ..ExtractArgs::default()
            },
            clean_output: Some(dir.path().join("clean_data")),
        };
        handle_command(command, &context(dir.path())).await.unwrap();

        assert!(dir.path().join("csv_outputs/Colima/s1_resumen.csv").exists());
        let audit = std::fs::read_to_string(dir.path().join("clean_data/audit_log_ingresos.csv")).unwrap();
        assert_eq!(audit.lines().count(), 2);
        assert!(audit.contains("negative annual income"));
        let clean = std::fs::read_to_string(dir.path().join("clean_data/s1_ingresos_clean.csv")).unwrap();
        assert_eq!(clean.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_extract_missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Extract(ExtractArgs {
            input: Some(dir.path().join("missing")),
            output: Some(dir.path().join("out")),
            ..ExtractArgs::default()
        });
        let err = handle_command(command, &context(dir.path())).await.unwrap_err();
        assert!(err.to_string().contains("Input root not found"));
    }

    #[tokio::test]
    async fn test_probe_and_profile() {
        let dir = TempDir::new().unwrap();
        seed_declarations(dir.path());
        let mut ctx = context(dir.path());
        ctx.json = true;

        let probe = Commands::Probe {
            file: dir.path().join("states/Colima/completo.json"),
            sample: 2,
            prefix: "declaracion".into(),
        };
        handle_command(probe, &ctx).await.unwrap();

        let extract = Commands::Extract(ExtractArgs {
            input: Some(dir.path().join("states")),
            output: Some(dir.path().join("csv_outputs")),
            ..ExtractArgs::default()
        });
        handle_command(extract, &ctx).await.unwrap();

        let profile = Commands::Profile {
            input: Some(dir.path().join("csv_outputs")),
            top: Some(1),
            iqr_multiplier: None,
        };
        handle_command(profile, &ctx).await.unwrap();
    }
}
