use anyhow::Result;
use fs_err::File;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{BufWriter, Write};
use tracing::info;

/// Creates a progress bar for monitoring function progress.
pub fn progress_bar_for_count(count: usize) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {human_pos}/{human_len} ({per_sec}, {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(count as u64).with_style(style)
}

pub fn write_json_file<T: Serialize>(
    file_name: &str,
    output_directory: &str,
    data: T,
) -> Result<()> {
    let path = format!("{output_directory}/{file_name}.json");
    info!("Writing to {path}");
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &data)?;
    writer.flush()?;
    Ok(())
}

/// Writes one CSV row per record, with a header row from the field names.
pub fn write_csv_file<T: Serialize>(
    file_name: &str,
    output_directory: &str,
    records: &[T],
) -> Result<()> {
    let path = format!("{output_directory}/{file_name}.csv");
    info!("Writing {} rows to {path}", records.len());
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
