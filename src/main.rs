use anyhow::{Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use rail_service_running::{
    aggregate, calendar,
    calendar::ActiveDay,
    config,
    exceptions::{ConflictPolicy, resolve},
    records, schedule, stations,
    utils::{write_csv_file, write_json_file},
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%d%m%Y").map_err(|err| format!("expected DDMMYYYY: {err}"))
}

#[derive(Parser)]
struct Args {
    /// Extracted timetable (.MCA) file
    #[clap(long)]
    timetable_path: String,
    /// NaPTAN Stops.csv
    #[clap(long)]
    stations_path: String,
    /// First date to resolve (DDMMYYYY), defaults to today
    #[clap(long, value_parser = parse_date)]
    start_date: Option<NaiveDate>,
    #[clap(long, default_value_t = 1, conflicts_with = "end_date")]
    no_days: u32,
    /// Last date to resolve (DDMMYYYY), inclusive
    #[clap(long, value_parser = parse_date)]
    end_date: Option<NaiveDate>,
    #[clap(long)]
    config_path: Option<String>,
    /// Overrides the conflict policy from the config file
    #[clap(long, value_enum)]
    conflict_policy: Option<ConflictPolicy>,
    #[clap(long)]
    output_directory: String,
    #[clap(long, value_enum, default_value = "csv")]
    output_format: OutputFormat,
    /// Also write the full resolved schedule for each date
    #[clap(long)]
    export_schedules: bool,
}

fn init_logger() -> Result<()> {
    let default_level = LevelFilter::INFO;
    let rust_log =
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| default_level.to_string());
    let env_filter = EnvFilter::try_new(rust_log).unwrap_or_else(|err| {
        eprintln!(
            "invalid {}, falling back to level '{}' - {}",
            EnvFilter::DEFAULT_ENV,
            default_level,
            err,
        );
        EnvFilter::new(default_level.to_string())
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .try_init()?;
    Ok(())
}

fn write_output<T: Serialize>(file_name: &str, args: &Args, rows: &[T]) -> Result<()> {
    match args.output_format {
        OutputFormat::Csv => write_csv_file(file_name, &args.output_directory, rows),
        OutputFormat::Json => write_json_file(file_name, &args.output_directory, rows),
    }
}

fn main() -> Result<()> {
    init_logger()?;
    let args = Args::parse();

    let config = config::read_config(args.config_path.as_deref())?;
    let policy = args
        .conflict_policy
        .unwrap_or(config.resolution.conflict_policy);

    let start_date = args
        .start_date
        .unwrap_or_else(|| Local::now().date_naive());
    let dates = match args.end_date {
        Some(end_date) if end_date < start_date => {
            bail!("End date {end_date} is before start date {start_date}")
        }
        Some(end_date) => calendar::date_range(start_date, end_date),
        None => calendar::date_range_from_count(start_date, args.no_days),
    };
    if dates.is_empty() {
        bail!("No dates to resolve");
    }
    info!(
        "Resolving {} days from {start_date} with {policy:?}",
        dates.len()
    );

    let raw_cif_text = records::read_file(&args.timetable_path)?;
    let cif_lines = records::split_lines(&raw_cif_text);
    let tables = schedule::build_tables(&cif_lines)?;
    let station_table = stations::read_naptan_stops(&args.stations_path, &config.stations)?;

    let summaries = aggregate::summarise_range(&tables, &dates, &station_table, policy);
    let start = start_date.format("%y%m%d");
    let file_name = if dates.len() == 1 {
        format!("full_uk_disruption_summary_{start}")
    } else {
        format!(
            "full_uk_disruption_summary_multiday_start_{start}_{}days",
            dates.len()
        )
    };
    write_output(&file_name, &args, &summaries)?;

    if args.export_schedules {
        for date in &dates {
            let resolved = resolve(&ActiveDay::on(&tables, *date), policy);
            let stops = aggregate::scheduled_stops(&resolved, &station_table);
            write_output(
                &format!("full_uk_schedule_{}", date.format("%y%m%d")),
                &args,
                &stops,
            )?;
        }
    }

    Ok(())
}
