#![forbid(unsafe_code)]

mod territory;

pub use territory::{load_scenario, synthetic_territory, Scenario, TerritorySpec};

use cost_surface::prelude::Raster;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Logs min, max and mean of the valid pixels of `raster`.
pub fn log_raster_summary(raster: &Raster) {
    let valid: Vec<f64> = raster
        .data
        .iter()
        .copied()
        .filter(|v| *v != raster.grid.nodata)
        .collect();
    if valid.is_empty() {
        info!("Raster holds no valid pixels.");
        return;
    }
    let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
    let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    info!(
        "{} of {} pixels valid | cost min {:.1}, max {:.1}, mean {:.1}.",
        valid.len(),
        raster.data.len(),
        min,
        max,
        mean
    );
}
