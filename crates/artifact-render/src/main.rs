use artifacting::{
    ArtifactingEngine, ArtifactingError, ColorParams, FrameMode, GeneratedPalette, NtscLayout, SCANLINE_SAMPLES,
};
use clap::{Parser, ValueEnum};
use image::{ImageFormat, RgbImage};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, Layer};

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
enum RenderError {
    #[error(transparent)]
    Artifacting(#[from] ArtifactingError),
    #[error("writing image: {0}")]
    Image(#[from] image::ImageError),
    #[error("creating output file: {0}")]
    Io(#[from] std::io::Error),
    #[error("installing log subscriber: {0}")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_tracing(args.verbose) {
        eprintln!("{err}");
    }

    match render(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) -> Result<(), RenderError> {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let log = tracing_subscriber::fmt::layer().with_filter(level);
    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(log))?;
    Ok(())
}

fn render(args: &Args) -> Result<(), RenderError> {
    let mut engine = ArtifactingEngine::new()?;

    let pal = matches!(args.region, Region::Pal);
    let mut params = if pal { ColorParams::pal() } else { ColorParams::ntsc() };
    if let Some(gamma) = args.gamma {
        params.gamma_correct = gamma;
    }

    let monitor: artifacting::MonitorMode = args.monitor.into();
    let tint = GeneratedPalette::generate(&params, monitor).tint_color;
    engine.set_color_params(&params, None, tint, monitor, 0)?;
    engine.set_ntsc_layout(args.layout.into());

    let mode = FrameMode {
        pal,
        chroma_artifacts: args.artifacts != Artifacts::None,
        chroma_artifacts_hi: args.artifacts == Artifacts::High,
        blend_out: args.blend || args.linear || args.persistence,
        blend_linear: args.linear,
        blend_mono_persistence: args.persistence && monitor.is_mono(),
        ..FrameMode::default()
    };

    let mut frame = Vec::new();
    for n in 0..args.frames.max(1) {
        // the first frame seeds the blend history
        let mode = FrameMode {
            blend_in: n > 0,
            ..mode
        };
        engine.begin_frame(&mode);

        frame.clear();
        for y in 0..args.height {
            let src = args.pattern.line(y, n);
            let mut line = vec![0; SCANLINE_SAMPLES * 2];
            engine.artifact8(y, &mut line, &src, !args.lores, false, !args.no_hblank);
            line.truncate(engine.output_width());
            frame.push(line);
        }
    }

    if args.double {
        frame = double_lines(&frame);
    }

    let width = engine.output_width();
    let mut image = RgbImage::new(width as u32, frame.len() as u32);
    for (y, line) in frame.iter().enumerate() {
        for (x, &px) in line.iter().enumerate() {
            let [b, g, r, _] = px.to_le_bytes();
            image.put_pixel(x as u32, y as u32, image::Rgb([r, g, b]));
        }
    }

    tracing::info!(
        width,
        height = frame.len(),
        builds = engine.table_builds(),
        path = %args.output.display(),
        "writing frame"
    );

    let mut file = BufWriter::new(File::create(&args.output)?);
    image.write_to(&mut file, ImageFormat::Png)?;

    Ok(())
}

/// Inserts an interpolated line after each rendered one.
fn double_lines(frame: &[Vec<u32>]) -> Vec<Vec<u32>> {
    let mut doubled = Vec::with_capacity(frame.len() * 2);
    for (i, line) in frame.iter().enumerate() {
        let next = frame.get(i + 1).unwrap_or(line);
        let mut mid = vec![0; line.len()];
        ArtifactingEngine::interpolate_scanlines(&mut mid, line, next);
        doubled.push(line.clone());
        doubled.push(mid);
    }
    doubled
}

#[derive(Parser)]
struct Args {
    /// Selects the video standard
    #[arg(short, long, value_enum, default_value_t)]
    region: Region,
    #[arg(short, long, value_enum, default_value_t)]
    monitor: Monitor,
    /// Chroma artifacting quality
    #[arg(short, long, value_enum, default_value_t)]
    artifacts: Artifacts,
    #[arg(short, long, value_enum, default_value_t)]
    pattern: Pattern,
    /// Accumulator layout for NTSC high artifacting
    #[arg(long, value_enum, default_value_t)]
    layout: Layout,
    /// Number of frames to render before writing the last one
    #[arg(short, long, default_value_t = 1)]
    frames: u32,
    #[arg(long, default_value_t = 240)]
    height: u32,
    /// Overrides the preset output gamma
    #[arg(long)]
    gamma: Option<f32>,
    /// Only read even source pixels
    #[arg(long)]
    lores: bool,
    /// Leave the horizontal blanking area unprocessed
    #[arg(long)]
    no_hblank: bool,
    /// Blend each frame with the previous one
    #[arg(long)]
    blend: bool,
    /// Blend in linear light
    #[arg(long)]
    linear: bool,
    /// Simulate phosphor persistence on monochrome monitors
    #[arg(long)]
    persistence: bool,
    /// Insert interpolated scanlines
    #[arg(long)]
    double: bool,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// PNG file to write
    output: PathBuf,
}

#[derive(Debug, Copy, Clone, ValueEnum, Default)]
enum Region {
    #[default]
    Ntsc,
    Pal,
}

#[derive(Debug, Copy, Clone, ValueEnum, Default)]
enum Monitor {
    #[default]
    Color,
    Peritel,
    Green,
    Amber,
    BluishWhite,
    White,
}

impl From<Monitor> for artifacting::MonitorMode {
    fn from(value: Monitor) -> Self {
        use artifacting::MonitorMode;
        match value {
            Monitor::Color => MonitorMode::Color,
            Monitor::Peritel => MonitorMode::Peritel,
            Monitor::Green => MonitorMode::MonoGreen,
            Monitor::Amber => MonitorMode::MonoAmber,
            Monitor::BluishWhite => MonitorMode::MonoBluishWhite,
            Monitor::White => MonitorMode::MonoWhite,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
enum Artifacts {
    None,
    #[default]
    Standard,
    High,
}

#[derive(Debug, Copy, Clone, ValueEnum, Default)]
enum Layout {
    #[default]
    Detect,
    Wide,
    Narrow,
}

impl From<Layout> for NtscLayout {
    fn from(value: Layout) -> Self {
        match value {
            Layout::Detect => NtscLayout::detect(),
            Layout::Wide => NtscLayout::Wide,
            Layout::Narrow => NtscLayout::Narrow,
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum, Default)]
enum Pattern {
    /// All 16 hues in columns with luma rising down the screen
    #[default]
    Bars,
    /// Single pixel luma stripes, the classic artifact color source
    Stripes,
    /// A scrolling checkerboard
    Checker,
    Ramp,
}

impl Pattern {
    fn line(&self, y: u32, frame: u32) -> Vec<u8> {
        let y = y as usize;
        (0..SCANLINE_SAMPLES)
            .map(|x| match self {
                Pattern::Bars => ((x / 28) as u8 & 15) << 4 | (y / 15 & 15) as u8,
                Pattern::Stripes => {
                    let luma = if (x + y / 60) & 1 == 0 { 0x0e } else { 0x00 };
                    ((y / 60) as u8 & 15) << 4 | luma
                }
                Pattern::Checker => {
                    let x = x + frame as usize * 2;
                    if (x / 16 + y / 16) & 1 == 0 {
                        0x0f
                    } else {
                        0x44
                    }
                }
                Pattern::Ramp => (x * 16 / SCANLINE_SAMPLES) as u8,
            })
            .collect()
    }
}
