// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{App, Arg, ArgMatches};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use std::process;
use std::str::FromStr;
use vidseam::{
    Cancellation, Config, ImageSequenceSink, ImageSequenceSource, LogSink, ProgressObserver,
    ResizeError, Result, Retargeter, SeamPolicy,
};

struct BarProgress(ProgressBar);

impl ProgressObserver for BarProgress {
    fn update(&self, processed: usize, total: usize) {
        self.0.set_length(total as u64);
        self.0.set_position(processed as u64);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message("carving");
    bar
}

fn parsed<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ResizeError::input(format!("invalid value '{}' for --{}", raw, name))),
    }
}

fn required<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    parsed(matches, name)?.ok_or_else(|| ResizeError::input(format!("{} is required", name)))
}

fn configure(matches: &ArgMatches) -> Result<Config> {
    let mut config = Config::new(required(matches, "width")?, required(matches, "height")?);
    if let Some(size) = parsed(matches, "batch-size")? {
        config.batch_size = size;
    }
    if let Some(weight) = parsed(matches, "temporal-weight")? {
        config.temporal_weight = weight;
    }
    config.distortion_ratio = parsed(matches, "distortion-ratio")?;
    if let Some(band) = parsed(matches, "band-width")? {
        config.band_width = band;
    }
    if let Some(mib) = parsed::<u64>(matches, "memory-budget")? {
        config.memory_budget = mib.saturating_mul(1024 * 1024);
    }
    if let Some(policy) = matches.value_of("seam-policy") {
        config.seam_policy = policy.parse::<SeamPolicy>()?;
    }
    if let Some(lanes) = parsed(matches, "lanes")? {
        config.lanes = lanes;
    }
    config.prefer_accelerator = matches.is_present("prefer-accelerator");
    Ok(config)
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = configure(matches)?;
    let frame_rate: f64 = required(matches, "frame-rate")?;
    let progress = BarProgress(progress_bar());
    let retargeter = Retargeter::new(config, &LogSink, &progress, Cancellation::new());

    let mut source = ImageSequenceSource::new(required::<String>(matches, "input")?, frame_rate);
    let mut sink = ImageSequenceSink::new(required::<String>(matches, "output")?);
    let summary = retargeter.run(&mut source, &mut sink)?;
    log::info!(
        "{} frames in {} batches, {} seam operations, {:?}",
        summary.frames,
        summary.batches,
        summary.seam_operations,
        summary.status
    );
    Ok(())
}

fn main() {
    let matches = App::new("vidseam")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Content-aware resizing for video frame sequences")
        .arg(
            Arg::with_name("input")
                .help("Directory of source frames, in file name order")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .help("Directory to write the resized frames into")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("width")
                .help("Target width in pixels")
                .required(true)
                .index(3),
        )
        .arg(
            Arg::with_name("height")
                .help("Target height in pixels")
                .required(true)
                .index(4),
        )
        .arg(
            Arg::with_name("batch-size")
                .long("batch-size")
                .takes_value(true)
                .help("Frames carved together (default 5)"),
        )
        .arg(
            Arg::with_name("temporal-weight")
                .long("temporal-weight")
                .takes_value(true)
                .help("Weight of the motion term, 0 to 1 (default 0.3)"),
        )
        .arg(
            Arg::with_name("distortion-ratio")
                .long("distortion-ratio")
                .takes_value(true)
                .help("Warn when an axis changes by more than this factor"),
        )
        .arg(
            Arg::with_name("band-width")
                .long("band-width")
                .takes_value(true)
                .help("Energy recomputed this far either side of a seam (default 2)"),
        )
        .arg(
            Arg::with_name("memory-budget")
                .long("memory-budget")
                .takes_value(true)
                .help("Working memory per batch, in MiB (default 2048)"),
        )
        .arg(
            Arg::with_name("seam-policy")
                .long("seam-policy")
                .takes_value(true)
                .possible_values(&["per-frame", "shared"])
                .help("One seam per frame, or one seam for the whole batch"),
        )
        .arg(
            Arg::with_name("frame-rate")
                .long("frame-rate")
                .takes_value(true)
                .default_value("30")
                .help("Frame rate of the sequence"),
        )
        .arg(
            Arg::with_name("lanes")
                .long("lanes")
                .takes_value(true)
                .help("Frames worked on at once (default: one per CPU)"),
        )
        .arg(
            Arg::with_name("prefer-accelerator")
                .long("prefer-accelerator")
                .help("Ask for an accelerator; falls back to the host"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("More logging; repeat for more"),
        )
        .get_matches();

    let level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&matches) {
        eprintln!("vidseam: {}", e);
        process::exit(match e {
            ResizeError::Input { .. } => 2,
            ResizeError::Cancelled { .. } => 130,
            _ => 1,
        });
    }
}
