//! Fjord Map - Application Library
//!
//! Desktop viewer for the fjord trip: draws the map through `walkers`, hosts the
//! search box, add-marker controls and itinerary sidebar, and wires them to the
//! [`fjord_map_lib::MapController`].

mod app;

pub use app::FjordMapApp;

pub const APP_NAME: &str = "Fjord Map";

/// Install the fmt subscriber; `RUST_LOG` overrides the default filter
fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,eframe=warn,wgpu_core=warn,wgpu_hal=warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .init();

    tracing::info!("{} v{} starting", APP_NAME, env!("CARGO_PKG_VERSION"));
}

/// Native entry point: logging, the async runtime for searches, then the window
pub fn run_native() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("fjord-map-worker")
        .build()?;
    let handle = runtime.handle().clone();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([360.0, 480.0])
            .with_title(APP_NAME),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(move |cc| Ok(Box::new(FjordMapApp::new(cc, handle)))),
    )?;

    tracing::info!("Window closed, shutting down");
    Ok(())
}
