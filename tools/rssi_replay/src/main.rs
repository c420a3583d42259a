use std::{
    env,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    process,
};

use gatetimer::{
    active_config,
    config::{CrossingPolicyKind, DroneSize},
    laptimer::{recommend_thresholds, Indicator, LapTimer, Notifier, DEFAULT_DROP_FRACTION},
    rx5808::RssiSource,
    GateConfig, KalmanFilter,
};

#[derive(Clone, Copy)]
struct ReplaySample {
    ms: u32,
    rssi: u8,
}

#[derive(Default)]
struct ReplaySource {
    next: u8,
}

impl RssiSource for ReplaySource {
    fn read_rssi(&mut self) -> u8 {
        self.next
    }
}

struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn pulse(&mut self, _indicator: Indicator, _duration_ms: u32) {}
}

struct Options {
    trace_path: PathBuf,
    expect_path: Option<PathBuf>,
    tolerance_ms: u32,
    raw: bool,
    noise: Option<u8>,
    config: GateConfig,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(env::args().skip(1).collect())? else {
        println!("{}", usage());
        return Ok(());
    };

    let samples = parse_trace(&options.trace_path)?;
    let Some(first) = samples.first() else {
        return Err(format!("{} holds no samples", options.trace_path.display()));
    };

    let config = options.config;
    let mut timer = LapTimer::new(
        ReplaySource::default(),
        config,
        SilentNotifier,
        KalmanFilter::from_config(&config.filter),
    );
    timer.start(first.ms);
    timer.start_crossing_calibration();

    let mut laps: Vec<u32> = Vec::new();
    for sample in &samples {
        if options.raw {
            timer.source_mut().next = sample.rssi;
            timer.handle_tick(sample.ms);
        } else {
            timer.record_sample(sample.ms, sample.rssi);
        }
        if timer.is_lap_available() {
            laps.push(timer.lap_time());
        }
    }
    let peak = timer.stop_crossing_calibration();

    println!("lap,number,ms");
    for (idx, lap_ms) in laps.iter().enumerate() {
        println!("lap,{},{}", idx + 1, lap_ms);
    }
    println!("summary,samples={},laps={},peak={}", samples.len(), laps.len(), peak);

    if let Some(noise) = options.noise {
        let rec = recommend_thresholds(noise, Some(peak), config.drone_size, DEFAULT_DROP_FRACTION);
        println!(
            "recommend,enter={},exit={},min_delta={}",
            rec.enter_rssi, rec.exit_rssi, rec.min_delta
        );
    }

    if let Some(expect_path) = options.expect_path {
        let expected = parse_expected_laps(&expect_path)?;
        let matches = expected.len() == laps.len()
            && expected
                .iter()
                .zip(&laps)
                .all(|(want, got)| want.abs_diff(*got) <= options.tolerance_ms);
        if !matches {
            eprintln!("expected laps: {:?}", expected);
            eprintln!("actual laps:   {:?}", laps);
            return Err("lap sequence mismatch".into());
        }
    }

    Ok(())
}

fn usage() -> String {
    [
        "usage: rssi_replay <trace.csv> [options]",
        "  --expect <laps.txt>     fail unless laps match, one ms value per line",
        "  --tolerance <ms>        allowed deviation per lap (default 0)",
        "  --raw                   trace holds unfiltered RSSI; run the Kalman filter",
        "  --enter <rssi>          override enter threshold",
        "  --exit <rssi>           override exit threshold",
        "  --drone <2|5>           override drone size class",
        "  --policy <peak-drop|exit-threshold>",
        "  --noise <rssi>          print threshold recommendation for this noise floor",
    ]
    .join("\n")
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    if args.is_empty() {
        return Err(usage());
    }

    let mut trace_path: Option<PathBuf> = None;
    let mut expect_path: Option<PathBuf> = None;
    let mut tolerance_ms = 0u32;
    let mut raw = false;
    let mut noise = None;
    let mut config = *active_config();

    let mut idx = 0usize;
    while idx < args.len() {
        let arg = args[idx].as_str();
        let mut value = || {
            idx += 1;
            args.get(idx)
                .map(String::as_str)
                .ok_or_else(|| format!("missing value after {arg}"))
        };
        match arg {
            "--expect" => expect_path = Some(PathBuf::from(value()?)),
            "--tolerance" => tolerance_ms = parse_number(value()?, "tolerance")?,
            "--raw" => raw = true,
            "--enter" => config.enter_rssi = parse_number(value()?, "enter")?,
            "--exit" => config.exit_rssi = parse_number(value()?, "exit")?,
            "--noise" => noise = Some(parse_number(value()?, "noise")?),
            "--drone" => {
                config.drone_size = match value()? {
                    "2" => DroneSize::TwoInch,
                    "5" => DroneSize::FiveInch,
                    other => return Err(format!("invalid drone size: {other}")),
                }
            }
            "--policy" => {
                config.policy = match value()? {
                    "peak-drop" => CrossingPolicyKind::PeakDrop,
                    "exit-threshold" => CrossingPolicyKind::ExitThreshold,
                    other => return Err(format!("invalid policy: {other}")),
                }
            }
            "-h" | "--help" => return Ok(None),
            other if other.starts_with('-') => return Err(format!("unknown argument: {other}")),
            other => {
                if trace_path.is_some() {
                    return Err("multiple trace paths provided".into());
                }
                trace_path = Some(PathBuf::from(other));
            }
        }
        idx += 1;
    }

    if config.enter_rssi <= config.exit_rssi {
        return Err("enter threshold must be above exit threshold".into());
    }

    Ok(Some(Options {
        trace_path: trace_path.ok_or_else(usage)?,
        expect_path,
        tolerance_ms,
        raw,
        noise,
        config,
    }))
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {field}: {value}"))
}

/// Accepts `rssi,<ms>,<value>` rows or bare `<ms>,<value>` rows.
fn parse_trace(path: &Path) -> Result<Vec<ReplaySample>, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (line_no, line_result) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line_result
            .map_err(|e| format!("failed to read {}:{}: {e}", path.display(), line_no))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed == "rssi,ms,value" {
            continue;
        }

        let mut parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.first() == Some(&"rssi") {
            parts.remove(0);
        }
        let &[ms, rssi] = parts.as_slice() else {
            return Err(format!(
                "{}:{} invalid trace line, expected <ms>,<rssi>",
                path.display(),
                line_no
            ));
        };

        let at = |field: &str| format!("{}:{} {field}", path.display(), line_no);
        out.push(ReplaySample {
            ms: parse_number(ms, &at("ms"))?,
            rssi: parse_number(rssi, &at("rssi"))?,
        });
    }

    Ok(out)
}

fn parse_expected_laps(path: &Path) -> Result<Vec<u32>, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let reader = BufReader::new(file);

    let mut laps = Vec::new();
    for (line_no, line_result) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line_result
            .map_err(|e| format!("failed to read {}:{}: {e}", path.display(), line_no))?;
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        laps.push(parse_number(
            token,
            &format!("{}:{} lap", path.display(), line_no),
        )?);
    }

    Ok(laps)
}
