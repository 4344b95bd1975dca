//! WeAct ePaper configuration checker
//!
//! ```bash
//! # Validate every weact_epaper display of a configuration file
//! weact-epaper-config check display.toml
//!
//! # List the supported panel models
//! weact-epaper-config models
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use weact_epaper_config::weact_epaper::{
    ConfigFile, Context, Esp32Pins, NativeModel, PanelCatalog, Renderers,
};

#[derive(Parser)]
#[command(name = "weact-epaper-config")]
#[command(version)]
#[command(about = "Validate WeAct ePaper display configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the resulting driver setup
    Check {
        /// TOML configuration file
        file: PathBuf,
    },

    /// List supported panel models
    Models,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cli.command {
        Commands::Check { file } => check(&file),
        Commands::Models => {
            models();
            Ok(())
        }
    }
}

fn check(path: &Path) -> Result<()> {
    let file = ConfigFile::load(path)
        .with_context(|| format!("Could not load {}", path.display()))?;

    let catalog = PanelCatalog::default();
    let ctx = Context {
        pins: &Esp32Pins,
        catalog: &catalog,
    };
    let panels = file
        .instantiate_all(&ctx, &mut Renderers::with_builtins())
        .with_context(|| format!("{} is not a valid configuration", path.display()))?;

    if panels.is_empty() {
        log::warn!("No weact_epaper displays found in {}", path.display());
    }
    for panel in &panels {
        panel.dump_config();
    }
    log::info!("{} display(s) OK", panels.len());
    Ok(())
}

fn models() {
    let catalog = PanelCatalog::default();
    println!("{:<10} {:<7} {:<10} reset pin", "model", "family", "size");
    for model in catalog.models() {
        let size = match model.native {
            NativeModel::TypeA(native) => format!("{}x{}", native.width(), native.height()),
            NativeModel::TypeB(_) => "-".to_string(),
        };
        let reset = if catalog.requires_reset_pin(model) {
            "required"
        } else {
            "optional"
        };
        println!(
            "{:<10} {:<7} {:<10} {}",
            model.key,
            model.family().tag(),
            size,
            reset
        );
    }
}
