use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use trackseries::{parse_file, to_csv_bytes, Format, Params, DEFAULT_MAX_SPAN_S};

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert a FIT/GPX/TCX track into a per-second CSV", long_about = None)]
struct Cli {
    /// FIT/GPX/TCX file to convert
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output CSV path (`-` for stdout); defaults to the input path with a `.csv` extension
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Largest accepted time span of the track (seconds)
    #[arg(long, default_value_t = DEFAULT_MAX_SPAN_S)]
    max_span: u64,

    /// Accept tracks of any time span; memory grows with the span (one row per second)
    #[arg(long, action = ArgAction::SetTrue)]
    no_max_span: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    handle_convert(cli)
}

fn handle_convert(cli: Cli) -> Result<()> {
    let params = Params {
        max_span_s: if cli.no_max_span {
            None
        } else {
            Some(cli.max_span)
        },
    };

    let format = Format::from_path(&cli.input)?;
    debug!("Input {} detected as {:?}", cli.input.display(), format);

    let t_parse = Instant::now();
    let series = parse_file(&cli.input, &params)
        .with_context(|| format!("failed to convert {}", cli.input.display()))?;
    info!(
        "Resampled {} to {} rows ({} columns) in {:.1} ms",
        cli.input.display(),
        series.len(),
        series.columns().len() + 1,
        t_parse.elapsed().as_secs_f64() * 1000.0
    );

    // Render fully before touching the output so a failure never leaves a partial file.
    let csv = to_csv_bytes(&series).context("failed to render CSV")?;

    let output = cli.output.unwrap_or_else(|| default_output_path(&cli.input));
    if output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(&csv).context("failed to write CSV to stdout")?;
        handle.flush()?;
    } else {
        fs::write(&output, &csv)
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!("Wrote CSV: {}", output.display());
    }
    Ok(())
}

/// Input path with its extension replaced by `.csv`, next to the input.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/data/rides/morning.fit")),
            PathBuf::from("/data/rides/morning.csv")
        );
        assert_eq!(
            default_output_path(Path::new("run.v2.tcx")),
            PathBuf::from("run.v2.csv")
        );
    }

    #[test]
    fn parses_arguments() {
        let cli = Cli::try_parse_from(["trackseries", "ride.gpx", "-o", "-", "--no-max-span"])
            .unwrap();
        assert_eq!(cli.input, PathBuf::from("ride.gpx"));
        assert_eq!(cli.output, Some(PathBuf::from("-")));
        assert!(cli.no_max_span);
        assert_eq!(cli.max_span, DEFAULT_MAX_SPAN_S);
    }
}
