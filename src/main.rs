use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use glyphcast::render::Rasterizer;
use glyphcast::render::encode::save_rgba;
use glyphcast::session::{CooldownTimer, SessionState};
use glyphcast::{ClassifyStatus, GestureController, GestureHost, GlyphConfig, Stroke};

const USAGE: &str = "usage: glyphcast [--config <file>] <command>

commands:
  replay <stroke.json>            classify a recorded stroke through the full session loop
  classify <image.png>            classify a saved 216x216 gesture image
  render <stroke.json> <out.png>  rasterize a stroke and save the canvas
  init-config                     write the effective settings to the config file";

enum Command {
    Replay(PathBuf),
    Classify(PathBuf),
    Render(PathBuf, PathBuf),
    InitConfig,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(Option<PathBuf>, Command)> {
    let mut config = None;
    let mut rest = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config = Some(PathBuf::from(args.next().context(USAGE)?));
        } else {
            rest.push(arg);
        }
    }
    let command = match rest.as_slice() {
        [cmd, stroke] if cmd == "replay" => Command::Replay(stroke.into()),
        [cmd, image] if cmd == "classify" => Command::Classify(image.into()),
        [cmd, stroke, out] if cmd == "render" => Command::Render(stroke.into(), out.into()),
        [cmd] if cmd == "init-config" => Command::InitConfig,
        _ => anyhow::bail!(USAGE),
    };
    Ok((config, command))
}

/// Game stand-in: prints the gesture and runs the cooldown
struct ReplayHost {
    cooldown: CooldownTimer,
    label: Option<String>,
}

impl GestureHost for ReplayHost {
    fn dispatch_gesture(&mut self, label: &str) {
        self.label = Some(label.to_string());
    }

    fn start_cooldown(&mut self) {
        self.cooldown.start();
    }

    fn cooldown_active(&self) -> bool {
        self.cooldown.is_active()
    }
}

fn load_stroke(path: &Path) -> Result<Stroke> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read stroke file: {}", path.display()))?;
    Stroke::from_json(&json).with_context(|| format!("Invalid stroke file: {}", path.display()))
}

async fn replay(config: GlyphConfig, stroke_path: &Path) -> Result<()> {
    let stroke = load_stroke(stroke_path)?;
    let tick_rate = config.tick_rate_hz.max(1);
    let dt = 1.0 / tick_rate as f32;
    let mut host = ReplayHost {
        cooldown: CooldownTimer::new(config.cooldown_secs),
        label: None,
    };
    let mut controller = GestureController::init(config)?;
    let mut interval = tokio::time::interval(Duration::from_secs_f32(dt));

    if !controller.begin_session(&host) {
        anyhow::bail!("Gesture session could not start");
    }
    for &point in stroke.points() {
        interval.tick().await;
        host.cooldown.tick(dt);
        controller.tick(dt, point, true, &mut host);
    }
    controller.end_session(&mut host);

    // Deferred inference completes on a later tick
    for _ in 0..tick_rate * 5 {
        if controller.state() == SessionState::Idle {
            break;
        }
        interval.tick().await;
        host.cooldown.tick(dt);
        controller.tick(dt, Default::default(), true, &mut host);
    }

    let status = controller.status().clone();
    controller.shutdown();
    report(&status, host.label.as_deref())
}

fn classify(config: GlyphConfig, image_path: &Path) -> Result<()> {
    let image = match image::open(image_path) {
        Ok(image) => Some(image),
        Err(err) => {
            log::warn!("Could not open {}: {}", image_path.display(), err);
            None
        }
    };
    let controller = GestureController::init(config)?;
    let status = controller.classify_texture(image.as_ref());
    controller.shutdown();
    let label = status.emitted().map(|l| l.as_str().to_string());
    report(&status, label.as_deref())
}

fn render(config: GlyphConfig, stroke_path: &Path, out: &Path) -> Result<()> {
    let stroke = load_stroke(stroke_path)?;
    config.validate()?;
    let canvas = Rasterizer::new(&config).rasterize_new(&stroke);
    save_rgba(canvas.image(), out)?;
    println!("{}", out.display());
    Ok(())
}

fn init_config(config: GlyphConfig) -> Result<()> {
    config.validate()?;
    let path = GlyphConfig::config_path().context("No config directory available")?;
    config.save_to(&path)?;
    println!("{}", path.display());
    Ok(())
}

fn report(status: &ClassifyStatus, label: Option<&str>) -> Result<()> {
    match status {
        ClassifyStatus::Done { result, .. } => {
            println!(
                "{} (top: {} {:.3})",
                label.unwrap_or("unknown"),
                result.label,
                result.confidence
            );
            Ok(())
        }
        ClassifyStatus::Error(msg) => anyhow::bail!("Classification failed: {}", msg),
        other => {
            println!("no gesture ({:?})", other);
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let (config_path, command) = parse_args(std::env::args().skip(1))?;
    let config = match config_path {
        Some(path) => GlyphConfig::load_from(&path)?,
        None => GlyphConfig::load(),
    };

    match command {
        Command::Replay(stroke) => replay(config, &stroke).await,
        Command::Classify(image) => classify(config, &image),
        Command::Render(stroke, out) => render(config, &stroke, &out),
        Command::InitConfig => init_config(config),
    }
}
