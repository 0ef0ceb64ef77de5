use anyhow::Result;
use clap::{Parser, Subcommand};
use mapops::tools;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mapops", about = "Offline basemap tile storage and serving for avalanche field operations")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Serve the configured basemaps over loopback HTTP
	Serve {
		/// Path to the YAML configuration file
		config: PathBuf,
	},
	/// Extract an archive into a <z>/<x>/<y> tile-file tree
	Extract {
		/// Archive kind: mbtiles or pmtiles
		kind: String,
		/// Path to the archive
		archive: PathBuf,
		/// Output root directory
		output: PathBuf,
		/// Basemap id (names the subdirectory)
		#[arg(long, default_value = "basemap")]
		id: String,
	},
	/// Print archive metadata
	Probe {
		/// Archive kind: mbtiles, pmtiles or directory
		kind: String,
		/// Path to the archive
		archive: PathBuf,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let cli = Cli::parse();
	match cli.command {
		Commands::Serve { config } => tools::serve::run(&config).await,
		Commands::Extract {
			kind,
			archive,
			output,
			id,
		} => tools::extract::run(&kind, &archive, &output, &id).await,
		Commands::Probe { kind, archive } => tools::probe::run(&kind, &archive).await,
	}
}
