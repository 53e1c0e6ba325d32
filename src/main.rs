use std::collections::HashMap;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use dota_rewind::brackets;
use dota_rewind::config::{NormalizerKey, Normalizers, Weights};
use dota_rewind::metrics::Metric;
use dota_rewind::opendota::OpenDota;
use dota_rewind::report;
use dota_rewind::score::{ScoreOptions, ScoreSession};

/// Rank a backlog of finished Dota 2 matches by how exciting they likely
/// were, without spoiling the results.
#[derive(Parser)]
#[command(name = "dota-rewind", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score many matches and print them most interesting first
    Rank(RankArgs),
    /// Score one match and print its full metric breakdown
    Score(ScoreArgs),
}

#[derive(Args)]
struct RankArgs {
    /// Tournament bracket URL to harvest match ids from
    #[arg(long)]
    url: Option<String>,
    /// Explicit match ids, comma separated
    #[arg(long, value_delimiter = ',', conflicts_with = "url")]
    ids: Vec<u64>,
    /// Show at most this many rows
    #[arg(long)]
    limit: Option<usize>,
    /// Attach broadcast links found on the bracket page (needs --url)
    #[arg(long, requires = "url")]
    vods: bool,
    /// Weighted-contribution reasons shown per row
    #[arg(long, default_value_t = 3)]
    top_reasons: usize,
    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Args)]
struct ScoreArgs {
    match_id: u64,
    /// Emit the full metric set as JSON
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Args, Default)]
struct OverrideArgs {
    /// Per-run weight override, repeatable: --weight kills_total=2.5
    #[arg(long = "weight", value_name = "METRIC=VALUE")]
    weights: Vec<String>,
    /// Per-run normalizer override, repeatable: --normalizer kills=80
    #[arg(long = "normalizer", value_name = "KEY=VALUE")]
    normalizers: Vec<String>,
}

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Rank(args) => rank(args),
        Command::Score(args) => score(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn rank(args: RankArgs) -> Result<()> {
    let options = parse_overrides(&args.overrides)?;

    let ids: Vec<u64> = if let Some(url) = &args.url {
        brackets::extract_all_match_ids(url)?.into_iter().collect()
    } else if !args.ids.is_empty() {
        args.ids.clone()
    } else {
        bail!("provide --url or --ids");
    };
    if ids.is_empty() {
        bail!("no match ids found");
    }

    let vods = match (&args.url, args.vods) {
        (Some(url), true) => brackets::extract_vod_urls(url)?,
        _ => HashMap::new(),
    };

    // The same overrides apply to every match in the batch, so fold them
    // into the session's base config up front.
    let session = ScoreSession::new(
        OpenDota::from_env(),
        Normalizers::default().overridden(&options.normalizers),
        Weights::default().overridden(&options.weights),
    )?;

    let mut ranked = session.rank_matches(&ids);
    if let Some(limit) = args.limit {
        ranked.truncate(limit);
    }
    print!("{}", report::render_table(&ranked, &vods, args.top_reasons));
    Ok(())
}

fn score(args: ScoreArgs) -> Result<()> {
    let options = parse_overrides(&args.overrides)?;
    let session = ScoreSession::new(
        OpenDota::from_env(),
        Normalizers::default(),
        Weights::default(),
    )?;
    let scored = session.score_match_with(args.match_id, &options)?;
    if args.json {
        println!("{}", report::render_json(&scored)?);
    } else {
        print!("{}", report::render_breakdown(&scored));
    }
    Ok(())
}

fn parse_overrides(args: &OverrideArgs) -> Result<ScoreOptions> {
    let mut options = ScoreOptions::default();
    for entry in &args.weights {
        let (metric, value) = split_override(entry)?;
        options.weights.push((metric.parse::<Metric>()?, value));
    }
    for entry in &args.normalizers {
        let (key, value) = split_override(entry)?;
        options
            .normalizers
            .push((key.parse::<NormalizerKey>()?, value));
    }
    Ok(options)
}

fn split_override(entry: &str) -> Result<(&str, f64)> {
    let (key, value) = entry
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got '{entry}'"))?;
    let value = value
        .parse::<f64>()
        .with_context(|| format!("invalid number in '{entry}'"))?;
    Ok((key.trim(), value))
}
