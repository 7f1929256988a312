//! Build command - populate a terrain database from rasters.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use terrabuild::raster::{GridResampleWarpService, ImageFileService};
use terrabuild::{DataSet, DataSetConfig, DatabaseMode, DirectoryEmitter, GeospatialExtents, HeightSampling, Source};
use tracing::info;

use crate::error::CliError;
use crate::progress::ProgressEmitter;

/// Population mode selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ModeArg {
    /// Populate the whole tree, then emit one LOD hierarchy
    Single,
    /// Populate row by row and emit paged sub-tile groups
    Paged,
}

impl From<ModeArg> for DatabaseMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => DatabaseMode::SingleTree,
            ModeArg::Paged => DatabaseMode::Paged,
        }
    }
}

/// Height sampling selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SamplingArg {
    /// Bilinear probe per vertex
    Bilinear,
    /// One resampled read per tile
    Bulk,
}

impl From<SamplingArg> for HeightSampling {
    fn from(sampling: SamplingArg) -> Self {
        match sampling {
            SamplingArg::Bilinear => HeightSampling::Bilinear,
            SamplingArg::Bulk => HeightSampling::Bulk,
        }
    }
}

/// Arguments for the build command.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Imagery raster, optionally with a layer index (e.g. ortho.png@1)
    #[arg(long = "image", value_name = "PATH[@LAYER]")]
    pub images: Vec<String>,

    /// Elevation raster
    #[arg(long = "height", value_name = "PATH")]
    pub heights: Vec<PathBuf>,

    /// Model placed over extents (e.g. mast.obj@100,100,120,120)
    #[arg(long = "model", value_name = "PATH@XMIN,YMIN,XMAX,YMAX")]
    pub models: Vec<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of quadtree levels (overrides config)
    #[arg(long)]
    pub levels: Option<u32>,

    /// Population mode (overrides config)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Height sampling (overrides config)
    #[arg(long, value_enum)]
    pub sampling: Option<SamplingArg>,

    /// Output file base name (overrides config)
    #[arg(long)]
    pub basename: Option<String>,

    /// Reproject sources to the resolution the tree needs
    #[arg(long)]
    pub reproject: bool,

    /// Compute the tree and report it without populating
    #[arg(long)]
    pub dry_run: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

/// Split `path@suffix` at the last `@`.
fn split_suffix(arg: &str) -> (&str, Option<&str>) {
    match arg.rsplit_once('@') {
        Some((path, suffix)) if !path.is_empty() => (path, Some(suffix)),
        _ => (arg, None),
    }
}

/// Parse `path[@layer]`.
pub fn parse_image_arg(arg: &str) -> Result<(PathBuf, usize), CliError> {
    match split_suffix(arg) {
        (path, Some(layer)) => {
            let layer = layer
                .parse()
                .map_err(|_| CliError::Usage(format!("Invalid layer '{}' in --image {}", layer, arg)))?;
            Ok((PathBuf::from(path), layer))
        }
        (path, None) => Ok((PathBuf::from(path), 0)),
    }
}

/// Parse `path@xmin,ymin,xmax,ymax`.
pub fn parse_model_arg(arg: &str) -> Result<(PathBuf, GeospatialExtents), CliError> {
    let usage = || CliError::Usage(format!("Expected PATH@XMIN,YMIN,XMAX,YMAX, got --model {}", arg));
    let (path, Some(bounds)) = split_suffix(arg) else {
        return Err(usage());
    };
    let values = bounds
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| usage())?;
    let [x_min, y_min, x_max, y_max] = values[..] else {
        return Err(usage());
    };
    let extents = GeospatialExtents::new(x_min, y_min, x_max, y_max, false);
    if !extents.valid() {
        return Err(usage());
    }
    Ok((PathBuf::from(path), extents))
}

/// Apply command line overrides on top of the file configuration.
pub fn apply_overrides(mut config: DataSetConfig, args: &BuildArgs) -> Result<DataSetConfig, CliError> {
    if let Some(levels) = args.levels {
        config = config.with_num_levels(levels);
    }
    if let Some(mode) = args.mode {
        config = config.with_database_mode(mode.into());
    }
    if let Some(sampling) = args.sampling {
        config = config.with_height_sampling(sampling.into());
    }
    if let Some(basename) = &args.basename {
        config = config.with_basename(basename.clone());
    }
    if args.reproject {
        config = config.with_reproject_to_required_resolution(true);
    }
    config.validate()?;
    Ok(config)
}

/// Sources named on the command line, in argument order per kind.
pub fn collect_sources(args: &BuildArgs) -> Result<Vec<Source>, CliError> {
    let mut sources = Vec::new();
    for image in &args.images {
        let (path, layer) = parse_image_arg(image)?;
        sources.push(Source::image(path).with_layer(layer));
    }
    for height in &args.heights {
        sources.push(Source::height_field(height.clone()));
    }
    for model in &args.models {
        let (path, extents) = parse_model_arg(model)?;
        sources.push(Source::model(path, extents));
    }
    if sources.is_empty() {
        return Err(CliError::Usage(
            "No sources given. Use --image, --height or --model.".to_string(),
        ));
    }
    Ok(sources)
}

/// Run the build command.
pub fn run(args: BuildArgs, config_path: &Path) -> Result<(), CliError> {
    let file_config = super::config::load_or_default(config_path)?;
    let config = apply_overrides(file_config, &args)?;
    let sources = collect_sources(&args)?;

    info!(
        sources = sources.len(),
        levels = config.num_levels,
        mode = %config.database_mode,
        output = %args.output.display(),
        "Starting build"
    );

    let raster_service = ImageFileService::new();
    let warp = GridResampleWarpService;

    let mut dataset = DataSet::new(config);
    for source in sources {
        dataset.add_source(source);
    }
    dataset.load_sources(&raster_service)?;
    dataset.compute_destination_graph(&warp)?;

    let summary = dataset.summary();
    if args.dry_run {
        println!("Sources:    {} ({} dropped)", summary.sources, summary.dropped_sources);
        println!("Levels:     {}", summary.levels);
        println!("Composites: {}", summary.composites);
        println!("Tiles:      {}", summary.tiles);
        return Ok(());
    }

    dataset.update_sources_for_destination_graph_needs(&warp)?;

    let directory = DirectoryEmitter::create(&args.output)?;
    let mut emitter = if args.quiet {
        ProgressEmitter::hidden(directory)
    } else {
        ProgressEmitter::new(directory, summary.tiles as u64)
    };
    dataset.populate(&mut emitter)?;

    let directory = emitter.into_inner();
    let summary = dataset.summary();
    println!(
        "Wrote {} tiles and {} groups to {} ({} sources, {} reprojected)",
        directory.tiles_written(),
        directory.groups_written(),
        directory.directory().display(),
        summary.sources,
        summary.reprojected_sources
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrabuild::SourceType;

    fn args(images: &[&str], heights: &[&str]) -> BuildArgs {
        BuildArgs {
            images: images.iter().map(|s| s.to_string()).collect(),
            heights: heights.iter().map(PathBuf::from).collect(),
            models: Vec::new(),
            output: PathBuf::from("out"),
            levels: None,
            mode: None,
            sampling: None,
            basename: None,
            reproject: false,
            dry_run: false,
            quiet: true,
        }
    }

    // ─── argument parsing ───────────────────────────────────────────────────

    #[test]
    fn test_parse_image_arg() {
        assert_eq!(parse_image_arg("ortho.png").unwrap(), (PathBuf::from("ortho.png"), 0));
        assert_eq!(parse_image_arg("ortho.png@2").unwrap(), (PathBuf::from("ortho.png"), 2));
        assert_eq!(
            parse_image_arg("data/a@b/ortho.png@1").unwrap(),
            (PathBuf::from("data/a@b/ortho.png"), 1)
        );
        assert!(matches!(parse_image_arg("ortho.png@top"), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_parse_model_arg() {
        let (path, extents) = parse_model_arg("mast.obj@100,100,120,130").unwrap();
        assert_eq!(path, PathBuf::from("mast.obj"));
        assert_eq!(extents.width(), 20.0);
        assert_eq!(extents.height(), 30.0);

        assert!(parse_model_arg("mast.obj").is_err());
        assert!(parse_model_arg("mast.obj@1,2,3").is_err());
        assert!(parse_model_arg("mast.obj@10,0,0,10").is_err());
    }

    // ─── configuration ──────────────────────────────────────────────────────

    #[test]
    fn test_overrides_apply() {
        let mut args = args(&["a.png"], &[]);
        args.levels = Some(4);
        args.mode = Some(ModeArg::Single);
        args.sampling = Some(SamplingArg::Bulk);
        args.basename = Some("alps".to_string());
        args.reproject = true;

        let config = apply_overrides(DataSetConfig::default(), &args).unwrap();
        assert_eq!(config.num_levels, 4);
        assert_eq!(config.database_mode, DatabaseMode::SingleTree);
        assert_eq!(config.height_sampling, HeightSampling::Bulk);
        assert_eq!(config.basename, "alps");
        assert!(config.reproject_to_required_resolution);
    }

    #[test]
    fn test_zero_levels_rejected() {
        let mut args = args(&["a.png"], &[]);
        args.levels = Some(0);
        assert!(matches!(
            apply_overrides(DataSetConfig::default(), &args),
            Err(CliError::Config(_))
        ));
    }

    // ─── sources ────────────────────────────────────────────────────────────

    #[test]
    fn test_collect_sources() {
        let sources = collect_sources(&args(&["a.png@1"], &["dem.png"])).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source_type(), SourceType::Image);
        assert_eq!(sources[0].layer(), 1);
        assert_eq!(sources[1].source_type(), SourceType::HeightField);
    }

    #[test]
    fn test_no_sources_is_usage_error() {
        assert!(matches!(collect_sources(&args(&[], &[])), Err(CliError::Usage(_))));
    }
}
