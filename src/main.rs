mod app;
mod gpu;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use winit::event_loop::{ControlFlow, EventLoop};

use warpfield::config::{
    FieldParams, DEFAULT_CELL_DIVISOR, DEFAULT_FRAMERATE, DEFAULT_MAX_DURATION,
    DEFAULT_RADIUS, DEFAULT_RELAXATION, DEFAULT_STRENGTH,
};
use warpfield::recording::payload::{self, ConcatOptions, Payload};
use warpfield::simulation::{ChannelLayout, Falloff, FieldInit, GridSizing};
use warpfield::SimConfig;

use app::App;

#[derive(Parser, Debug)]
#[command(name = "warpfield", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive window (the default).
    Run(RunArgs),
    /// Join recordings from a directory into one payload.
    Concat(ConcatArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Simulation steps (and recorded frames) per second.
    #[arg(long, default_value_t = DEFAULT_FRAMERATE)]
    framerate: u32,

    /// Viewport pixels per grid cell.
    #[arg(long, default_value_t = DEFAULT_CELL_DIVISOR)]
    cell_divisor: f32,

    /// Pin the grid to this many columns; rows follow the window aspect.
    #[arg(long)]
    columns: Option<u32>,

    /// Longest recording, in seconds.
    #[arg(long, default_value_t = DEFAULT_MAX_DURATION)]
    max_duration: f32,

    /// Values stored per cell.
    #[arg(long, value_enum, default_value_t = ChannelsArg::Two)]
    channels: ChannelsArg,

    /// Start from uniform noise in [-1, 1] instead of zero.
    #[arg(long)]
    noise: bool,

    /// Seed for --noise.
    #[arg(long, requires = "noise")]
    seed: Option<u64>,

    /// Pointer impulse falloff.
    #[arg(long, value_enum, default_value_t = FalloffArg::Linear)]
    falloff: FalloffArg,

    #[arg(long, default_value_t = DEFAULT_RELAXATION)]
    relaxation: f32,

    #[arg(long, default_value_t = DEFAULT_RADIUS)]
    radius: f32,

    #[arg(long, default_value_t = DEFAULT_STRENGTH)]
    strength: f32,

    /// Leave out the [width, height] header from the recording buffer.
    #[arg(long)]
    no_header: bool,

    /// Keep the live field when a new recording starts.
    #[arg(long)]
    keep_field: bool,

    /// Loop playback instead of stopping at the last frame.
    #[arg(long = "loop")]
    loop_playback: bool,

    /// Play this payload on startup.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Where the E key writes the recording.
    #[arg(long, default_value = "recording.dat")]
    export: PathBuf,
}

#[derive(Args, Debug)]
struct ConcatArgs {
    /// Directory containing the .dat files to join, in name order.
    #[arg(long)]
    dir: PathBuf,

    /// Output payload path.
    #[arg(long)]
    out: PathBuf,

    /// Frame rate the recordings were made at.
    #[arg(long)]
    in_framerate: u32,

    /// Frame rate of the output; must divide --in-framerate.
    #[arg(long)]
    out_framerate: u32,

    /// Scale values so this maps to 1.0, then clamp to [-1, 1].
    #[arg(long)]
    max: Option<f32>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ChannelsArg {
    Two,
    Four,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FalloffArg {
    Linear,
    Quadratic,
}

impl RunArgs {
    fn to_config(&self) -> anyhow::Result<SimConfig> {
        let config = SimConfig {
            framerate: self.framerate,
            max_duration: self.max_duration,
            sizing: match self.columns {
                Some(columns) => GridSizing::FixedColumns(columns),
                None => GridSizing::CellDivisor(self.cell_divisor),
            },
            layout: match self.channels {
                ChannelsArg::Two => ChannelLayout::Rg,
                ChannelsArg::Four => ChannelLayout::Rgba,
            },
            init: if self.noise {
                FieldInit::Noise { seed: self.seed }
            } else {
                FieldInit::Zero
            },
            falloff: match self.falloff {
                FalloffArg::Linear => Falloff::Linear,
                FalloffArg::Quadratic => Falloff::Quadratic,
            },
            params: FieldParams::new(self.relaxation, self.radius, self.strength)?,
            header: !self.no_header,
            reset_field_on_record: !self.keep_field,
            loop_playback: self.loop_playback,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.cmd {
        Some(Command::Run(args)) => cmd_run(args),
        Some(Command::Concat(args)) => cmd_concat(args),
        None => cmd_run(cli.run),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;
    let load = args
        .load
        .as_deref()
        .map(|path| Payload::read(path).with_context(|| format!("load payload '{}'", path.display())))
        .transpose()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, load, args.export);
    event_loop.run_app(&mut app)?;
    app.into_result()
}

fn cmd_concat(args: ConcatArgs) -> anyhow::Result<()> {
    let paths = recording_files(&args.dir)?;
    anyhow::ensure!(!paths.is_empty(), "no .dat files in '{}'", args.dir.display());

    let mut payloads = Vec::with_capacity(paths.len());
    for path in &paths {
        let payload = Payload::read(path).with_context(|| format!("read '{}'", path.display()))?;
        log::info!(
            "Loaded {}: {}x{}, {} frames",
            path.display(),
            payload.dims.width,
            payload.dims.height,
            payload.frame_count()
        );
        payloads.push(payload);
    }

    let joined = payload::concat(
        &payloads,
        ConcatOptions {
            in_framerate: args.in_framerate,
            out_framerate: args.out_framerate,
            max: args.max,
        },
    )?;
    joined
        .write(&args.out)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    log::info!(
        "Wrote {} frames from {} files to {}",
        joined.frame_count(),
        payloads.len(),
        args.out.display()
    );
    Ok(())
}

fn recording_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read dir '{}'", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "dat") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
