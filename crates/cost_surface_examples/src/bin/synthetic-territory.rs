use cost_surface::prelude::*;
use cost_surface_examples::{init_tracing, load_scenario, log_raster_summary, synthetic_territory, Scenario};
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let scenario = match std::env::args().nth(1) {
        Some(path) => load_scenario(&path)?,
        None => Scenario::default(),
    };
    let inputs = synthetic_territory(&scenario.territory)?;
    info!(
        "Territory: {} regions, {} deposits ({}).",
        inputs.regions().len(),
        inputs.deposits().len(),
        inputs.srid()
    );

    let config = scenario.run.clone().with_srid(inputs.srid());
    let runner = CostSurfaceRunner::try_new(config)?;

    let mut log = FnSink::new(|event| match event {
        CostEvent::GridBuilt { grid, tiles } => info!(
            "Grid {}x{} at {:?}, {} tiles.",
            grid.width, grid.height, grid.origin, tiles
        ),
        CostEvent::TileRetried { id, attempt, error } => {
            warn!("Tile {:?} attempt {} failed: {}.", id, attempt, error)
        }
        CostEvent::Warning { context, message } => warn!("[{}] {}.", context, message),
        _ => {}
    });
    let mut evaluated = VecSink::only([CostEventKind::TileEvaluated]);
    let result = {
        let mut sinks = MultiSink::with_sinks(vec![&mut log as &mut dyn EventSink, &mut evaluated]);
        runner.run_with_events(&inputs, sinks.as_event_sink())?
    };

    let slowest = evaluated
        .as_slice()
        .iter()
        .filter_map(|event| match event {
            CostEvent::TileEvaluated { id, attempts, .. } => Some((*attempts, *id)),
            _ => None,
        })
        .max();
    if let Some((attempts, id)) = slowest.filter(|(attempts, _)| *attempts > 1) {
        info!("Tile {:?} needed the most attempts ({}).", id, attempts);
    }
    info!(
        "{} tiles evaluated, {} region-gap pixels, {} clamped.",
        result.stats.tiles, result.stats.pixels.region_gaps, result.stats.pixels.clamped
    );

    let raster = result.export(&scenario.output)?;
    log_raster_summary(&raster);
    Ok(())
}
