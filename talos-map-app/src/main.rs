use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use talos_map::prelude::*;

/// Inspect the region map and manage collected markers
#[derive(Parser, Debug)]
#[command(name = "talos-map", version)]
struct Cli {
    /// Directory holding persisted map state
    #[arg(long, default_value = ".talos-map")]
    state_dir: PathBuf,

    /// Map configuration file (JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load the dataset from a directory instead of the bundled one
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Do not fetch marker icons
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List regions with their subregions
    Regions,
    /// Marker counts per type in a region
    Counts { region: String },
    /// Open a region and report what is drawn
    Switch {
        region: String,
        /// Overlay layer to show (M, L1-L3, B1-B4)
        #[arg(long, default_value = "M")]
        layer: String,
    },
    /// Mark a marker collected, or uncollected when already collected
    Toggle { marker_id: String },
    /// Write collected markers to a file
    Export { file: PathBuf },
    /// Merge collected markers from a file
    Import { file: PathBuf },
    /// Find a tracked resource node on the map
    Locate {
        node_id: String,
    },
}

fn load_dataset(cli: &Cli) -> Result<Dataset> {
    let dataset = match &cli.data_dir {
        Some(dir) => Dataset::from_dir(dir)?,
        None => Dataset::bundled()?,
    };
    Ok(dataset)
}

fn load_config(cli: &Cli) -> Result<MapConfig> {
    match &cli.config {
        Some(path) => MapConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(MapConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let dataset = Arc::new(load_dataset(&cli)?);
    let config = Arc::new(load_config(&cli)?);
    let backend = Arc::new(
        FileStore::open(&cli.state_dir)
            .with_context(|| format!("opening state directory {}", cli.state_dir.display()))?,
    );
    let mut session = MapSession::new(dataset.clone(), config, backend);
    session.set_icon_preload(!cli.offline);

    match &cli.command {
        Command::Regions => {
            for region_id in dataset.regions.region_ids() {
                if let Some(region) = dataset.regions.get_region(region_id) {
                    println!("{:<12} {}", region_id, region.subregions.join(", "));
                }
            }
        }
        Command::Counts { region } => {
            if dataset.regions.get_region(region).is_none() {
                bail!("unknown region {}", region);
            }
            let mut counts: Vec<(String, usize)> = session
                .index()
                .get_marker_counts_for_region(region)
                .into_iter()
                .collect();
            counts.sort();
            for (marker_type, count) in counts {
                println!("{:<24} {}", marker_type, count);
            }
        }
        Command::Switch { region, layer } => {
            let kind: LayerKind = layer.parse()?;
            session.select_region(region).await?;
            if kind != LayerKind::M {
                session.switch_layer(kind).await?;
            }
            session.process_events()?;
            let view = session.core().view();
            println!(
                "{}: {} markers, {} shown, center ({:.2}, {:.2}) zoom {}",
                region,
                session.markers().marker_count(),
                session.markers().visible_marker_count(session.core().map()),
                view.lat,
                view.lng,
                view.zoom
            );
            for layer_id in session.core().map().list_layers() {
                println!("  {}", layer_id);
            }
            session.shutdown()?;
        }
        Command::Toggle { marker_id } => {
            if session.index().get_marker(marker_id).is_none() {
                bail!("unknown marker {}", marker_id);
            }
            let collected = session.toggle_collected(marker_id)?;
            println!("{} {}", marker_id, if collected { "collected" } else { "not collected" });
        }
        Command::Export { file } => {
            let json = session.export_collection()?;
            std::fs::write(file, json).with_context(|| format!("writing {}", file.display()))?;
            println!(
                "exported {} markers to {}",
                session.collection().collected_count(),
                file.display()
            );
        }
        Command::Import { file } => {
            let json =
                std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
            let count = session.import_collection(&json)?;
            println!(
                "imported {} records, {} markers collected",
                count,
                session.collection().collected_count()
            );
        }
        Command::Locate { node_id } => {
            let Some(record) = dataset.resources.get(node_id).cloned() else {
                bail!("unknown resource node {}", node_id);
            };
            let location = session
                .show_node_on_map(&record.name, &record.map, &record.region, &record.id)
                .await?;
            println!(
                "{} is {} cluster {} in {} at ({:.2}, {:.2}): {}",
                record.id,
                location.marker_type,
                location.cluster_index,
                location.subregion_id,
                location.center.lat,
                location.center.lng,
                location.marker_ids().join(", ")
            );
            session.shutdown()?;
        }
    }

    log::debug!("done");
    Ok(())
}
