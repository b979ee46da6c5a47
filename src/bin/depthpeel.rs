use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use depthpeel::{
    DeviceLimits, PeelOpts, PeelingAlgorithm as _, PeelingHost, PeelingMethod, Rgba, SceneDesc,
};

#[derive(Parser, Debug)]
#[command(name = "depthpeel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Peel a scene and write the resolved frame as a PNG.
    Frame(FrameArgs),
    /// Print the pass plan of a method as JSON.
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
struct PeelArgs {
    /// Peeling method (DUAL_PEELING, FRONT_TO_BACK, WEIGHTED_AVERAGE, WEIGHTED_SUM).
    #[arg(long)]
    method: Option<PeelingMethod>,

    /// Number of layers to peel.
    #[arg(long, default_value_t = 4)]
    layers: u32,

    /// Run every planned pass even after one peels nothing.
    #[arg(long)]
    no_occlusion_query: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    peel: PeelArgs,

    /// Input scene JSON. Defaults to the built-in three cubes.
    #[arg(long = "in")]
    in_path: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Opaque background as `RRGGBB` hex; overrides the scene file.
    #[arg(long, value_parser = parse_hex_rgb)]
    background: Option<Rgba>,

    /// Print per-pass statistics as JSON to stderr.
    #[arg(long)]
    stats: bool,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    #[command(flatten)]
    peel: PeelArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn parse_hex_rgb(s: &str) -> Result<Rgba, String> {
    let hex = s.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("expected RRGGBB, got '{s}'"));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map(|v| f32::from(v) / 255.0)
            .map_err(|e| format!("invalid hex color '{s}': {e}"))
    };
    Ok(Rgba::new(channel(0)?, channel(2)?, channel(4)?, 1.0))
}

fn opts(args: &PeelArgs) -> PeelOpts {
    PeelOpts::default()
        .with_layers(args.layers)
        .with_occlusion_query(!args.no_occlusion_query)
        .with_limits(DeviceLimits::from_env())
}

fn read_scene_json(path: &Path) -> anyhow::Result<SceneDesc> {
    let f = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
    let r = BufReader::new(f);
    let desc: SceneDesc = serde_json::from_reader(r).with_context(|| "parse scene JSON")?;
    Ok(desc)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let desc = match &args.in_path {
        Some(path) => read_scene_json(path)?,
        None => SceneDesc::three_cubes(),
    };
    let mut scene = desc.build()?;

    let mut opts = opts(&args.peel);
    if let Some(background) = args.background.or(desc.background) {
        opts = opts.with_background(background);
    }

    let mut host = PeelingHost::new(args.peel.method, opts)?;
    host.init(i64::from(args.width), i64::from(args.height))?;
    let stats = host.display(&mut scene)?;
    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(stats)?);
    }
    let frame = host.frame()?;
    host.dispose();

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {} ({})", args.out.display(), host.method());
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let host = PeelingHost::new(args.peel.method, opts(&args.peel))?;
    let json = serde_json::to_string_pretty(host.algorithm().plan())?;
    println!("{json}");
    Ok(())
}
