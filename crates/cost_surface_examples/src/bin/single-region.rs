use cost_surface::prelude::*;
use cost_surface_examples::init_tracing;
use geo::{polygon, Point};
use glam::DVec2;
use tracing::info;

/// One 2 km square priced (elec 10, mats 20, transport 5) with a deposit 2 km east of its
/// centre: the pixel anchored at the centre costs 5 * 2 + 20 + 10 = 40.
fn main() -> anyhow::Result<()> {
    init_tracing();

    let region = Region::new(
        "01",
        polygon![
            (x: -1000.0, y: -1000.0),
            (x: 1000.0, y: -1000.0),
            (x: 1000.0, y: 1000.0),
            (x: -1000.0, y: 1000.0),
        ],
        Srid::LAMBERT_93,
        RegionPrices::new(10.0, 20.0, 5.0),
    );
    let deposit = Deposit::new("quarry", Point::new(2000.0, 0.0), Srid::LAMBERT_93);
    let inputs = SpatialInputs::new(vec![region], vec![deposit])?;

    let raster = CostSurfaceRunner::try_new(RunConfig::new(500.0))?
        .run(&inputs)?
        .reassemble()?;

    for y in 0..raster.grid.height {
        let row: Vec<String> = raster
            .row(y)
            .iter()
            .map(|v| {
                if *v == raster.grid.nodata {
                    "   -".to_string()
                } else {
                    format!("{v:4}")
                }
            })
            .collect();
        info!("{}", row.join(" "));
    }

    if let Some((x, y)) = raster.grid.world_to_pixel(DVec2::ZERO) {
        info!("Cost at the centre: {:?}.", raster.get(x, y));
    }
    Ok(())
}
