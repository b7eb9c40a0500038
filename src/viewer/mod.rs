//! beamtrace viewer - the egui application hosting the scene.

mod app;
mod settings;

pub use settings::Settings;

use std::path::PathBuf;

use anyhow::Result;

/// Run the viewer with an optional model to add at startup.
/// `verbosity`: 0=warn, 1=info, 2=debug, 3=trace.
/// `log_file`: optional path to redirect log output.
pub fn run(initial_model: Option<PathBuf>, verbosity: u8, log_file: Option<PathBuf>) -> Result<()> {
    init_tracing(verbosity, log_file.as_deref());

    let settings = Settings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.window_width, settings.window_height])
            .with_title("beamtrace"),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    eframe::run_native(
        "beamtrace",
        options,
        Box::new(move |cc| Ok(Box::new(app::TracerApp::new(cc, settings, initial_model)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run viewer: {e}"))
}

/// Initialize the tracing subscriber with console or file output.
fn init_tracing(verbosity: u8, log_file: Option<&std::path::Path>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(path) = log_file {
        match std::fs::File::create(path) {
            Ok(file) => {
                let _ = fmt()
                    .with_env_filter(filter)
                    .with_writer(std::sync::Arc::new(file))
                    .with_ansi(false)
                    .try_init();
                return;
            }
            Err(e) => eprintln!("Could not open log file {}: {e}", path.display()),
        }
    }
    let _ = fmt().with_env_filter(filter).try_init();
}
