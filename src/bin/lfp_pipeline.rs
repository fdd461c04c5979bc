/// lfp-pipeline: run the tone-conditioned LFP analysis over session files
/// and write every (session, tone) mean and spectrogram to one safetensors
/// file.
///
/// Each input file holds `lfp` [trials, samples] and `tones` [trials].
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use lfp::{low_tone_consistency, write_results, AnalysisConfig, Pipeline, SessionFiles};

#[derive(Parser, Debug)]
#[command(name = "lfp-pipeline", about = "Outlier rejection, filtering and spectrograms for LFP sessions")]
struct Args {
    /// Session files (safetensors), one per session.
    #[arg(long, num_args = 1.., required = true)]
    input: Vec<PathBuf>,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// JSON file overriding the default analysis parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Baseline-correct every condition mean.
    #[arg(long)]
    baseline_correct: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if args.baseline_correct {
        cfg.baseline_correct = true;
    }

    let pipeline = Pipeline::new(cfg).context("invalid analysis configuration")?;
    let cfg = pipeline.config();
    let filter = pipeline.filter();
    println!(
        "fs {} Hz, low-pass {} Hz (order {}), stimulus {:.1}–{:.1} ms",
        filter.fs(),
        filter.cutoff(),
        filter.order(),
        cfg.stim_onset_ms(),
        cfg.stim_offset_ms()
    );
    let source = SessionFiles::new(args.input);
    let results = pipeline.run(&source)?;

    for r in &results {
        println!("{}: {}/{} trials valid", r.id, r.n_valid, r.n_trials);
        for (tone, cond) in &r.conditions {
            println!(
                "  tone {tone:>10}: {:>4} trials, {} freq × {} time bins",
                cond.n_trials,
                cond.spectrogram.n_freqs(),
                cond.spectrogram.n_times()
            );
        }
        if let Some(c) = &r.contrast {
            let diff = c.difference();
            let peak = diff.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            println!("  low {} vs high {}: max |difference| = {peak:.4e}", c.low_tone, c.high_tone);
        }
    }

    if let Some(avg) = low_tone_consistency(&results)? {
        println!("low-tone mean averaged over sessions: {} samples", avg.len());
    }

    write_results(&results, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Written → {}", args.output.display());
    Ok(())
}
