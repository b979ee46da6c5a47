use std::path::PathBuf;

use anyhow::Context as _;
use depthpeel::{PeelOpts, PeelingHost, PeelingMethod, Scene};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let out_dir = PathBuf::from("target").join("three_cubes");
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir '{}'", out_dir.display()))?;

    let mut scene = Scene::three_cubes();
    for method in PeelingMethod::ALL {
        let mut host = PeelingHost::new(Some(method), PeelOpts::default())?;
        host.init(640, 480)?;
        let stats = host.display(&mut scene)?;
        let composites = stats.composite_passes();
        let passes = stats.geometry_passes();
        let frame = host.frame()?;
        host.dispose();

        let path = out_dir.join(format!("{}.png", method.as_str().to_ascii_lowercase()));
        image::save_buffer_with_format(
            &path,
            &frame.data,
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        eprintln!(
            "{method}: {passes} geometry passes, {composites} composites -> {}",
            path.display()
        );
    }
    Ok(())
}
