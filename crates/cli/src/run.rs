//! `aquiscope run | validate | trend`.

use std::path::{Path, PathBuf};

use aquiscope_analysis::classify::ClassificationConfig;
use aquiscope_analysis::config::{HistoryColumns, HistoryConfig};
use aquiscope_analysis::filter::{shacs_in_region, WellFilter};
use aquiscope_analysis::load::load_history;
use aquiscope_analysis::model::{AnalysisReport, FineBand, TrendResult};
use aquiscope_analysis::series::build_series;
use aquiscope_analysis::trend::estimate_trend;
use aquiscope_analysis::{load_input, AnalysisConfig, AnalysisError};

use crate::exit_codes::EXIT_RUN_UNMATCHED;
use crate::CliError;

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::runtime(format!("cannot read {}: {e}", path.display())))
}

fn load_config(config_path: &Path) -> Result<AnalysisConfig, CliError> {
    let config_str = read_file(config_path)?;
    Ok(AnalysisConfig::from_toml(&config_str)?)
}

// ============================================================================
// run
// ============================================================================

pub struct RunArgs {
    pub config: PathBuf,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub strict: bool,
    pub filter: WellFilter,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let RunArgs {
        config: config_path,
        json: json_output,
        output: output_file,
        strict,
        filter,
    } = args;
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let input = load_input(&config, |file| {
        let path = base_dir.join(file);
        std::fs::read_to_string(&path)
            .map_err(|e| AnalysisError::Io(format!("cannot read {}: {e}", path.display())))
    })?;

    let mut report = aquiscope_analysis::run(&config, &input)?;
    let total_wells = report.wells.len();

    if let (Some(region), Some(shac)) = (&filter.region, &filter.shac) {
        let available = shacs_in_region(&report.wells, region);
        if !available.contains(shac) {
            let hint = if available.is_empty() {
                format!("no wells are keyed to region '{region}'")
            } else {
                format!("SHACs in {region}: {}", available.join(", "))
            };
            return Err(
                CliError::usage(format!("SHAC '{shac}' is not in region '{region}'")).with_hint(hint),
            );
        }
    }
    filter.restrict(&mut report);

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::other(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&report);
    if !filter.is_empty() {
        eprintln!("filter: {} of {} well(s) reported", report.wells.len(), total_wells);
    }

    if strict {
        let excluded: Vec<String> = report
            .reconciliations
            .iter()
            .flat_map(|r| {
                r.unmatched
                    .excluded_units()
                    .into_iter()
                    .map(move |unit| format!("{}:{unit}", r.level))
            })
            .collect();
        if !excluded.is_empty() {
            return Err(CliError::new(
                EXIT_RUN_UNMATCHED,
                format!("unit keys not present in all sources: {}", excluded.join(", ")),
            )
            .with_hint("align unit names across sources, or run without --strict"));
        }
    }

    Ok(())
}

/// Human summary to stderr.
fn print_summary(report: &AnalysisReport) {
    let w = &report.summary.wells;
    eprintln!(
        "{}: {} wells, {} with a trend, {} declining ({:.1}%)",
        report.meta.config_name, w.total_wells, w.wells_with_trend, w.declining, w.pct_declining,
    );

    let critical: Vec<String> = report
        .summary
        .critical_units
        .iter()
        .map(|(level, n)| format!("{n} {level}"))
        .collect();
    if !critical.is_empty() {
        eprintln!("critical units: {}", critical.join(", "));
    }

    for recon in &report.reconciliations {
        let t = &recon.totals;
        eprintln!(
            "{} reconciliation: {} units, {} {} vs {} {} (gap {}), {} key(s) excluded",
            recon.level,
            t.units,
            recon.labels.registry,
            t.registry,
            recon.labels.census_b,
            t.census_b,
            t.gap_vs_b,
            recon.unmatched.excluded_units().len(),
        );
    }

    if let Some(ref e) = report.summary.extraction {
        let pct = e
            .pct_unregistered
            .map(|p| format!("{p:.1}%"))
            .unwrap_or_else(|| "n/a".into());
        eprintln!(
            "unregistered extraction: ~{} wells ({} of the latest census)",
            e.unregistered_estimate, pct
        );
    }

    for view in &report.views {
        eprintln!("view '{}': {} row(s)", view.name, view.rows.len());
    }
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let tables = usize::from(config.wells.history.is_some())
        + usize::from(config.wells.summary.is_some())
        + config.reconcile.len() * 3;
    eprintln!(
        "{}: valid ({} input table(s), {} reconciliation(s), {} view(s))",
        config.name,
        tables,
        config.reconcile.len(),
        config.views.len()
    );
    Ok(())
}

// ============================================================================
// trend
// ============================================================================

pub struct TrendArgs {
    pub history: PathBuf,
    pub station: String,
    pub station_column: String,
    pub date_column: String,
    pub depth_column: String,
    pub date_format: String,
    pub json: bool,
}

pub fn cmd_trend(args: TrendArgs) -> Result<(), CliError> {
    let csv_data = read_file(&args.history)?;
    let config = HistoryConfig {
        file: args.history.display().to_string(),
        date_format: args.date_format,
        columns: HistoryColumns {
            station_id: args.station_column,
            date: args.date_column,
            depth: args.depth_column,
            name: None,
            region: None,
            shac: None,
            comuna: None,
            latitude: None,
            longitude: None,
            elevation: None,
        },
    };
    let records = load_history(&csv_data, &config)?;

    if !records.iter().any(|r| r.station_id == args.station) {
        return Err(CliError::usage(format!(
            "station '{}' not found in {}",
            args.station,
            args.history.display()
        )));
    }

    let series = build_series(&records, &args.station);
    let policies = ClassificationConfig::default();
    let result = estimate_trend(&series, &policies.coarse);

    if args.json {
        let value = match &result {
            Ok(t) => serde_json::json!({
                "station_id": args.station,
                "trend": t,
                "fine_band": policies.fine.classify(t.slope),
            }),
            Err(reason) => serde_json::json!({
                "station_id": args.station,
                "undefined": reason,
            }),
        };
        let json_str = serde_json::to_string_pretty(&value)
            .map_err(|e| CliError::other(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    match result {
        Ok(t) => print_trend(&args.station, &t, policies.fine.classify(t.slope)),
        Err(reason) => println!("{}: trend undefined, {reason}", args.station),
    }
    Ok(())
}

fn print_trend(station: &str, t: &TrendResult, band: FineBand) {
    println!("station:   {station}");
    println!("points:    {}", t.n);
    println!("slope:     {:+.4} m/year", t.slope);
    println!("r_squared: {:.4}", t.r_squared);
    println!("category:  {}", t.category);
    println!("band:      {band}");
}
