use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;

use encounter_data::{covariates::SurfaceTable, table::ChecklistTable};
use encounter_model::dataset::Dataset;
use encounter_render::map::{self, MapStyle};
use encounter_spatial::{
    gpkg,
    projection::{Laea, LonLat, Point},
    raster::{DisplayWindow, Extent, rasterize},
};

use crate::{
    command::{Context, ModelChoice},
    config::PipelineConfig,
    pipeline::{self, TrainedModel},
    util::{self, Output},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PredictArg {
    /// Joined checklist table the model is fitted on
    #[arg(long)]
    input: PathBuf,
    /// Prediction surface (`cell_id,latitude,longitude,<covariates>`)
    #[arg(long)]
    surface: PathBuf,
    /// GeoPackage with boundaries drawn over the map
    #[arg(long)]
    boundaries: Option<PathBuf>,
    /// Boundary layer name (defaults to the first feature layer)
    #[arg(long, requires = "boundaries")]
    layer: Option<String>,
    /// Directory the predictions and map are written to
    #[arg(long)]
    output_dir: PathBuf,
    #[clap(flatten)]
    model: ModelChoice,
}

/// Map inputs besides the model.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MapInputs<'a> {
    pub surface: &'a Path,
    pub boundaries: Option<&'a Path>,
    pub layer: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CellPrediction<'a> {
    cell_id: &'a str,
    latitude: f64,
    longitude: f64,
    encounter_rate: f64,
}

/// Predicts the calibrated encounter rate of every surface cell for the
/// standard checklist, then writes `predictions.csv`, `map.tif` and
/// `map_legend.json` into `dir`.
pub(crate) fn predict_stage(
    trained: &TrainedModel,
    covariate_names: &[String],
    inputs: MapInputs<'_>,
    dir: &Path,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    util::create_dir(dir)?;
    let mut surface = SurfaceTable::open(inputs.surface).with_context(|| {
        format!("Failed to read prediction surface: {}", inputs.surface.display())
    })?;
    surface
        .align_to(covariate_names)
        .context("Prediction surface does not match the training covariates")?;
    let data = Dataset::from_surface(&surface, &trained.occasion);
    let rates = data
        .rows()
        .iter()
        .map(|x| trained.model.predict(x))
        .collect::<Vec<_>>();
    tracing::info!(cells = rates.len(), "predicted surface");

    let path = dir.join("predictions.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for (cell, &encounter_rate) in surface.cells.iter().zip(&rates) {
        writer
            .serialize(CellPrediction {
                cell_id: &cell.cell_id,
                latitude: cell.latitude,
                longitude: cell.longitude,
                encounter_rate,
            })
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let projection = Laea::new(config.map.centre);
    let points = surface
        .cells
        .iter()
        .map(|cell| projection.forward(LonLat::new(cell.longitude, cell.latitude)))
        .collect::<Vec<_>>();
    let extent = Extent::from_points(points.iter().copied())
        .context("Prediction surface has no cells")?;
    let zoom = config
        .map
        .zoom
        .map(|bounds| Extent::from_lonlat_bounds(&projection, &bounds));
    let window = DisplayWindow::new(extent, zoom.as_ref(), config.map.resolution_m)
        .context("Failed to build the map window")?;
    let raster = rasterize(points.into_iter().zip(rates), window).crop();

    let boundaries = match inputs.boundaries {
        Some(path) => read_boundaries(path, inputs.layer, &projection)?,
        None => vec![],
    };
    let (image, scale) = map::render_map(&raster, &boundaries, &MapStyle::default())
        .context("Failed to render the map")?;
    let map_path = dir.join("map.tif");
    image
        .save_tiff(&map_path)
        .with_context(|| format!("Failed to write map: {}", map_path.display()))?;
    Output::save_json(&scale, Some(&dir.join("map_legend.json")))?;
    tracing::info!(
        path = %map_path.display(),
        width = image.width,
        height = image.height,
        "wrote map"
    );
    Ok(())
}

fn read_boundaries(
    path: &Path,
    layer: Option<&str>,
    projection: &Laea,
) -> anyhow::Result<Vec<Vec<Point>>> {
    let layer = gpkg::read_boundaries(path, layer)
        .with_context(|| format!("Failed to read boundaries: {}", path.display()))?;
    tracing::info!(layer = %layer.name, lines = layer.lines.len(), "read boundaries");
    Ok(layer
        .lines
        .iter()
        .map(|line| line.iter().map(|&c| projection.forward(c)).collect())
        .collect())
}

fn fit_and_predict(
    table: &ChecklistTable,
    inputs: MapInputs<'_>,
    dir: &Path,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let trained = pipeline::fit(table, config)?;
    predict_stage(&trained, &table.covariate_names, inputs, dir, config)
}

pub(crate) fn run(arg: &PredictArg, ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.config_for(&arg.model);
    let table = util::read_table(&arg.input)?;
    let inputs = MapInputs {
        surface: &arg.surface,
        boundaries: arg.boundaries.as_deref(),
        layer: arg.layer.as_deref(),
    };
    fit_and_predict(&table, inputs, &arg.output_dir, &config)
}

#[cfg(test)]
mod tests {
    use std::{fmt::Write as _, fs};

    use super::*;
    use crate::pipeline::tests::synthetic_table;

    fn write_surface(path: &Path, covariate: &str) {
        let mut text = format!("cell_id,latitude,longitude,{covariate}\n");
        for i in 0..10 {
            for j in 0..10 {
                let lat = 33.0 + f64::from(i) * 0.1;
                let lon = -84.0 + f64::from(j) * 0.1;
                writeln!(text, "c{i}_{j},{lat},{lon},{}", f64::from(i) / 10.0).unwrap();
            }
        }
        fs::write(path, text).unwrap();
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.forest.num_trees = 20;
        config.forest.threads = Some(2);
        config
    }

    #[test]
    fn test_predict_writes_map_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let surface = dir.path().join("surface.csv");
        write_surface(&surface, "pland_forest");
        let out = dir.path().join("out");
        let inputs = MapInputs {
            surface: &surface,
            boundaries: None,
            layer: None,
        };
        fit_and_predict(&synthetic_table(200), inputs, &out, &config()).unwrap();

        let mut reader = csv::Reader::from_path(out.join("predictions.csv")).unwrap();
        let rates = reader
            .records()
            .map(|r| r.unwrap()[3].parse::<f64>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(rates.len(), 100);
        assert!(rates.iter().all(|r| (0.0..=1.0).contains(r)));
        // the northern half of the surface is forested
        assert!(rates[95] > rates[5]);

        let tiff = fs::read(out.join("map.tif")).unwrap();
        assert!(tiff.starts_with(b"II*\0") || tiff.starts_with(b"MM\0*"));
        assert!(out.join("map_legend.json").exists());
    }

    #[test]
    fn test_surface_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let surface = dir.path().join("surface.csv");
        write_surface(&surface, "elevation_mean");
        let inputs = MapInputs {
            surface: &surface,
            boundaries: None,
            layer: None,
        };
        let err = fit_and_predict(&synthetic_table(200), inputs, dir.path(), &config());
        assert!(err.is_err());
    }
}
