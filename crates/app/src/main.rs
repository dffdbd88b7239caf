use std::{
    f32::consts::PI,
    io::Write as _,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand, ValueEnum};
use matrix_clock_core::{
    pages::spectrum_overlay, spawn_spectrum_worker, Animation, AnimationLibrary, AppConfig,
    AudioSource, ClockReading, ConfigSnapshot, EnvReadings, FrameBuffer, Liveview, LiveviewSink,
    MatrixLayout, RenderEnv, RenderScheduler, Result, Rgb, LIVEVIEW_PREFIX,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Settings { json } => apply_settings(&json),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Host loop for the LED matrix clock", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the render loop against a simulated matrix.
    Run(RunArgs),
    /// Apply a partial settings update to the default configuration and
    /// print the result.
    Settings {
        /// JSON object, e.g. '{"appTime": 7000, "fps": 25}'.
        json: String,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Target frame rate.
    #[arg(long, default_value_t = 30)]
    fps: u8,

    /// Stop after this many seconds; runs forever when omitted.
    #[arg(long)]
    seconds: Option<u64>,

    /// Wiring topology of the simulated matrix.
    #[arg(long, value_enum, default_value_t = LayoutArg::Tiled)]
    layout: LayoutArg,

    /// Liveview sampling interval in milliseconds; 0 disables it.
    #[arg(long, default_value_t = 250)]
    liveview_interval: u16,

    /// Render the liveview frames as ANSI blocks in the terminal.
    #[arg(long)]
    preview: bool,

    /// Frequency of the simulated audio input.
    #[arg(long, default_value_t = 1_000.0)]
    tone_hz: f32,

    /// Skip the audio worker and the spectrum overlay.
    #[arg(long)]
    no_audio: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Tiled,
    ColumnsZigzag,
    RowsZigzag,
    ColumnsBottom,
}

impl From<LayoutArg> for MatrixLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Tiled => MatrixLayout::TiledRows,
            LayoutArg::ColumnsZigzag => MatrixLayout::ColumnsZigzag,
            LayoutArg::RowsZigzag => MatrixLayout::RowsZigzag,
            LayoutArg::ColumnsBottom => MatrixLayout::ColumnsProgressiveBottom,
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = AppConfig::default();
    config.render.target_fps = args.fps;
    config.liveview.interval_ms = args.liveview_interval;
    config.matrix.layout = args.layout.into();
    let snapshot = ConfigSnapshot::new(config);

    let mut canvas = FrameBuffer::new(
        snapshot.matrix.width,
        snapshot.matrix.height,
        snapshot.matrix.layout,
    );

    let mut scheduler = RenderScheduler::new();
    scheduler.apply_config(&snapshot);
    scheduler.set_pages(matrix_clock_core::native_pages());

    if !args.no_audio {
        let source = ToneSource::new(args.tone_hz, snapshot.audio.sample_rate);
        let slot = spawn_spectrum_worker(source, &snapshot.audio)?;
        scheduler.set_overlays(vec![spectrum_overlay(slot)]);
    }

    let mut liveview = Liveview::new(snapshot.liveview.interval_ms);
    if args.preview {
        liveview.set_sink(Box::new(TerminalSink::new(
            snapshot.matrix.width,
            snapshot.matrix.height,
        )));
    } else {
        liveview.set_sink(Box::new(LogSink));
    }

    let animations = demo_animations()?;
    let mut readings = EnvReadings::default();
    readings.update_indoor(21.5, 45.0);

    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    tracing::info!(
        fps = snapshot.render.target_fps,
        liveview_ms = snapshot.liveview.interval_ms,
        audio = !args.no_audio,
        "starting host loop"
    );

    loop {
        let now = Instant::now();
        if matches!(deadline, Some(end) if now >= end) {
            break;
        }

        // Fixed per-iteration order: render, sample, sensors, publish.
        let env = RenderEnv {
            config: &snapshot,
            readings: &readings,
            animations: &animations,
        };
        let budget = scheduler.update(&mut canvas, now, &env);
        liveview.sample(&canvas, now);
        readings.clock = clock_reading();
        liveview.flush();

        if budget > 0 {
            thread::sleep(Duration::from_millis(budget.min(50) as u64));
        }
    }

    tracing::info!("host loop finished");
    Ok(())
}

fn apply_settings(json: &str) -> Result<()> {
    let next = AppConfig::default().with_settings_json(json)?;
    println!("{next:#?}");
    Ok(())
}

fn clock_reading() -> ClockReading {
    use chrono::{Datelike, Local, Timelike};

    let now = Local::now();
    ClockReading {
        hour: now.hour() as u8,
        minute: now.minute() as u8,
        second: now.second() as u8,
        day: now.day() as u8,
        month: now.month() as u8,
        weekday: now.weekday().num_days_from_monday() as u8,
    }
}

/// Synthetic audio input: a pure sine tone, paced so that one block takes
/// as long to "record" as it would on real hardware.
struct ToneSource {
    freq_hz: f32,
    sample_rate: u32,
    phase: usize,
}

impl ToneSource {
    fn new(freq_hz: f32, sample_rate: u32) -> Self {
        Self {
            freq_hz,
            sample_rate,
            phase: 0,
        }
    }
}

impl AudioSource for ToneSource {
    fn read_block(&mut self, buf: &mut [f32]) -> Result<usize> {
        for slot in buf.iter_mut() {
            *slot =
                (2.0 * PI * self.freq_hz * self.phase as f32 / self.sample_rate as f32).sin();
            self.phase += 1;
        }
        thread::sleep(Duration::from_secs_f64(
            buf.len() as f64 / self.sample_rate as f64,
        ));
        Ok(buf.len())
    }
}

/// Liveview sink that only records that a frame went out.
struct LogSink;

impl LiveviewSink for LogSink {
    fn publish(&mut self, frame: &[u8]) {
        tracing::debug!(bytes = frame.len(), "liveview frame");
    }
}

/// Renders liveview frames as colored blocks in the terminal. The frame
/// payload is already in logical row-major order, so this is a straight
/// scan regardless of the configured wiring layout.
struct TerminalSink {
    width: usize,
    height: usize,
}

impl TerminalSink {
    fn new(width: usize, height: usize) -> Self {
        print!("\x1b[2J");
        Self { width, height }
    }
}

impl LiveviewSink for TerminalSink {
    fn publish(&mut self, frame: &[u8]) {
        let pixels = &frame[LIVEVIEW_PREFIX.len()..];
        if pixels.len() != self.width * self.height * 3 {
            tracing::warn!(bytes = frame.len(), "malformed liveview frame");
            return;
        }

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let _ = write!(out, "\x1b[H");
        for y in 0..self.height {
            for x in 0..self.width {
                let i = (y * self.width + x) * 3;
                let _ = write!(
                    out,
                    "\x1b[48;2;{};{};{}m  ",
                    pixels[i],
                    pixels[i + 1],
                    pixels[i + 2]
                );
            }
            let _ = writeln!(out, "\x1b[0m");
        }
        let _ = out.flush();
    }
}

/// Placeholder icon set drawn in code; on the device these come from an
/// icon store on flash.
fn demo_animations() -> Result<AnimationLibrary> {
    let mut library = AnimationLibrary::new();

    library.insert(
        "time",
        Animation::new(
            8,
            8,
            500,
            vec![
                icon_frame(CLOCK_ICON, Rgb::new(80, 160, 255)),
                icon_frame(CLOCK_ICON_ALT, Rgb::new(80, 160, 255)),
            ],
        )?,
    );
    library.insert(
        "date",
        Animation::new(8, 8, 0, vec![icon_frame(CALENDAR_ICON, Rgb::new(255, 120, 60))])?,
    );
    library.insert(
        "temp",
        Animation::new(8, 8, 0, vec![icon_frame(THERMO_ICON, Rgb::new(255, 80, 80))])?,
    );
    library.insert(
        "hum",
        Animation::new(8, 8, 0, vec![icon_frame(DROP_ICON, Rgb::new(60, 140, 255))])?,
    );
    library.insert(
        "weather",
        Animation::new(8, 8, 0, vec![icon_frame(SUN_ICON, Rgb::new(255, 200, 40))])?,
    );

    Ok(library)
}

fn icon_frame(pattern: [&str; 8], color: Rgb) -> Vec<Rgb> {
    let mut pixels = Vec::with_capacity(64);
    for row in pattern {
        for c in row.chars() {
            pixels.push(if c == '#' { color } else { Rgb::BLACK });
        }
    }
    pixels
}

const CLOCK_ICON: [&str; 8] = [
    "..####..",
    ".#....#.",
    "#...#..#",
    "#...#..#",
    "#..#...#",
    "#......#",
    ".#....#.",
    "..####..",
];

const CLOCK_ICON_ALT: [&str; 8] = [
    "..####..",
    ".#....#.",
    "#...#..#",
    "#...##.#",
    "#......#",
    "#......#",
    ".#....#.",
    "..####..",
];

const CALENDAR_ICON: [&str; 8] = [
    ".#....#.",
    "########",
    "#......#",
    "########",
    "#.#.#.##",
    "#......#",
    "#.#.#..#",
    "########",
];

const THERMO_ICON: [&str; 8] = [
    "...##...",
    "...#.#..",
    "...##...",
    "...#.#..",
    "...##...",
    "..####..",
    "..####..",
    "...##...",
];

const DROP_ICON: [&str; 8] = [
    "....#...",
    "...##...",
    "..####..",
    ".######.",
    ".######.",
    ".#.####.",
    "..####..",
    "...##...",
];

const SUN_ICON: [&str; 8] = [
    "#..##..#",
    ".######.",
    ".######.",
    "########",
    "########",
    ".######.",
    ".######.",
    "#..##..#",
];
