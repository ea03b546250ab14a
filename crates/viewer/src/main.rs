use std::collections::BTreeMap;

use scene_viewer_lib::harness::ViewerHarness;
use scene_viewer_lib::{CaptureOptions, ViewerSettings};
use shared::{CameraParams, LayoutMode};

/// Idle slots to run while the demo tumble spins
const TUMBLE_SLOTS: usize = 8;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scene_viewer=info,scene_viewer_lib=info".into()),
        )
        .init();

    let mut settings = ViewerSettings::load();
    let args = parse_args();
    if let Some(mode) = args.layout {
        settings.layout.mode = mode;
    }
    let (width, height) = args.size.unwrap_or((800, 600));

    let mut h = ViewerHarness::with_settings(width, height, &settings);
    tracing::info!(
        layout = h.window.layout_mode().name(),
        panes = h.window.pane_count(),
        width,
        height,
        "viewer ready"
    );

    if let Err(e) = h.window.set_standard_orthographic_view() {
        tracing::warn!("standard view: {e}");
    }
    let driving = scene_viewer_lib::layout::driving_pane(h.window.layout_mode());
    if let Err(e) = h.window.start_tumble(driving, [0.0, 0.0, 1.0], 0.05) {
        tracing::warn!("tumble: {e}");
    }
    for _ in 0..TUMBLE_SLOTS {
        h.step();
    }
    if let Err(e) = h.window.stop_tumble(driving) {
        tracing::warn!("stop tumble: {e}");
    }
    h.run_until_idle(4);

    match h.window.capture(&CaptureOptions::default()) {
        Ok(image) => tracing::info!(
            width = image.width,
            height = image.height,
            bytes = image.pixels.len(),
            "captured"
        ),
        Err(e) => tracing::error!("capture failed: {e}"),
    }

    if args.save_settings {
        tracing::info!("saving settings");
        h.window.settings().save();
    }

    let cameras: BTreeMap<usize, CameraParams> = (0..h.window.pane_count())
        .filter_map(|pane| h.window.camera(pane).ok().map(|c| (pane + 1, c)))
        .collect();
    match serde_json::to_string_pretty(&cameras) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("failed to serialize cameras: {e}"),
    }
}

#[derive(Default)]
struct Args {
    layout: Option<LayoutMode>,
    size: Option<(u32, u32)>,
    save_settings: bool,
}

fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    let w = w.trim().parse().ok()?;
    let h = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--layout" if i + 1 < args.len() => {
                let name = &args[i + 1];
                match LayoutMode::from_name(name) {
                    Some(mode) => parsed.layout = Some(mode),
                    None => tracing::error!("Unknown layout {name}"),
                }
                i += 1;
            }
            "--size" if i + 1 < args.len() => {
                let value = &args[i + 1];
                match parse_size(value) {
                    Some(size) => parsed.size = Some(size),
                    None => tracing::error!("Invalid size {value}, expected <width>x<height>"),
                }
                i += 1;
            }
            "--save-settings" => parsed.save_settings = true,
            other => tracing::warn!("Ignoring argument {other}"),
        }
        i += 1;
    }
    parsed
}
