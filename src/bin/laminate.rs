use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use laminate::{
    Affine, BezPath, BlendMode, Compositor, DisplayList, DisplayListBuilder, EngineConfig,
    GpuContext, GpuDisabledSwitch, ISize, LayerId, LayerTree, LayerTreeBuilder, PictureLayer,
    PlatformTraits, Rect, Rgba8, SnapshotController, SnapshotSources, Surface, Vec2,
    render::{cpu::CpuSurface, headless::HeadlessContext},
};

#[derive(Parser, Debug)]
#[command(name = "laminate", version)]
struct Cli {
    /// Engine configuration JSON. `LAMINATE_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the demo scene to a PNG through the snapshot controller.
    Snapshot(SnapshotArgs),
    /// Composite a sequence of animated frames and print one JSON report per frame.
    Frames(FramesArgs),
}

#[derive(Parser, Debug)]
struct SnapshotArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 512)]
    width: u32,

    #[arg(long, default_value_t = 512)]
    height: u32,

    /// Backend providing the onscreen context.
    #[arg(long, value_enum, default_value_t = BackendChoice::Cpu)]
    backend: BackendChoice,

    /// Render-target size limit of the emulated GPU context.
    #[arg(long, default_value_t = 4096)]
    max_dimension: u32,

    /// Force the software path even when a GPU context exists.
    #[arg(long)]
    software: bool,
}

#[derive(Parser, Debug)]
struct FramesArgs {
    /// Number of frames to composite.
    #[arg(long, default_value_t = 8)]
    frames: u32,

    #[arg(long, default_value_t = 256)]
    width: u32,

    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Write the last frame as PNG.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    /// No GPU context; snapshots use software targets.
    Cpu,
    /// CPU-backed emulation of a GPU context.
    Headless,
    /// vello on wgpu.
    #[cfg(feature = "gpu")]
    Wgpu,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Snapshot(args) => cmd_snapshot(args, &config),
        Command::Frames(args) => cmd_frames(args, &config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(p) => EngineConfig::from_json_file(p)
            .with_context(|| format!("load config '{}'", p.display()))?,
        None => EngineConfig::default(),
    }
    .with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn make_context(args: &SnapshotArgs) -> anyhow::Result<Option<Arc<dyn GpuContext>>> {
    let ctx: Arc<dyn GpuContext> = match args.backend {
        BackendChoice::Cpu => return Ok(None),
        BackendChoice::Headless => Arc::new(HeadlessContext::new(args.max_dimension)),
        #[cfg(feature = "gpu")]
        BackendChoice::Wgpu => Arc::new(laminate::render::gpu::WgpuContext::new()?),
    };
    Ok(Some(ctx))
}

fn cmd_snapshot(args: SnapshotArgs, config: &EngineConfig) -> anyhow::Result<()> {
    let size = ISize::new(args.width, args.height);
    let switch =
        GpuDisabledSwitch::new(config.snapshot.gpu_disabled_at_startup || args.software);
    let mut sources = SnapshotSources::new(switch);
    if let Some(ctx) = make_context(&args)? {
        sources = sources.with_onscreen_context(ctx);
    }
    let controller = SnapshotController::new(Arc::new(sources), PlatformTraits::detect());

    let image = controller
        .make_raster_snapshot(&demo_content(size), size)
        .with_context(|| {
            format!(
                "snapshot {}x{} produced no image",
                size.width, size.height
            )
        })?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image.save_png(&args.out)?;
    eprintln!(
        "wrote {} ({}x{})",
        args.out.display(),
        image.width(),
        image.height()
    );
    Ok(())
}

fn cmd_frames(args: FramesArgs, config: &EngineConfig) -> anyhow::Result<()> {
    let size = ISize::new(args.width, args.height);
    let mut compositor = Compositor::new(config);
    let mut surface = CpuSurface::new(size);
    let background = demo_content(size);

    for frame in 0..args.frames {
        let tree = animated_scene(size, &background, frame)?;
        let report = compositor.draw_frame(tree, &mut surface)?;
        println!("{}", serde_json::to_string(&report)?);
    }

    if let Some(out) = &args.out {
        let image = surface.snapshot().context("no frame was presented")?;
        image.save_png(out)?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

/// Checkerboard with a diagonal band; busy enough to qualify for raster caching.
fn demo_content(size: ISize) -> DisplayList {
    let mut b = DisplayListBuilder::new();
    let cell = 16.0;
    let (w, h) = (f64::from(size.width), f64::from(size.height));
    b.fill_rect(size.to_rect(), Rgba8::opaque(18, 20, 28));
    let mut y = 0.0;
    while y < h {
        let mut x = if ((y / cell) as u32) % 2 == 0 { 0.0 } else { cell };
        while x < w {
            b.fill_rect(Rect::new(x, y, x + cell, y + cell), Rgba8::opaque(40, 44, 60));
            x += cell * 2.0;
        }
        y += cell;
    }
    let mut band = BezPath::new();
    band.move_to((0.0, h * 0.6));
    band.line_to((w * 0.6, 0.0));
    band.line_to((w, 0.0));
    band.line_to((w, h * 0.4));
    band.line_to((w * 0.4, h));
    band.line_to((0.0, h));
    band.close_path();
    b.fill_path(band, Rgba8::new(250, 180, 60, 200));
    b.build()
}

fn animated_scene(
    size: ISize,
    background: &DisplayList,
    frame: u32,
) -> anyhow::Result<LayerTree> {
    let t = f64::from(frame);
    let ticker = DisplayListBuilder::new()
        .fill_rect(
            Rect::new(8.0, 8.0, 40.0, 20.0),
            Rgba8::opaque((frame * 40 % 256) as u8, 200, 120),
        )
        .build();
    let badge = DisplayListBuilder::new()
        .fill_rect(Rect::new(0.0, 0.0, 48.0, 48.0), Rgba8::opaque(90, 160, 255))
        .fill_rect(Rect::new(24.0, 24.0, 72.0, 72.0), Rgba8::opaque(255, 90, 140))
        .build();

    let mut background_layer = PictureLayer::new(background.clone(), Vec2::ZERO);
    background_layer.is_complex = true;

    let mut b = LayerTreeBuilder::new(size);
    b.push_container(LayerId(1))?
        .push_transform(LayerId(2), Affine::translate((-(t * 4.0), 0.0)))?
        .add_picture(LayerId(3), background_layer)?
        .pop()?
        .push_blend(LayerId(4), 200, Vec2::new(64.0, 64.0), BlendMode::Multiply)?
        .add_picture(LayerId(5), PictureLayer::new(badge, Vec2::ZERO))?
        .pop()?
        .add_picture(LayerId(6), PictureLayer::new(ticker, Vec2::ZERO))?
        .pop()?;
    Ok(b.build()?)
}
