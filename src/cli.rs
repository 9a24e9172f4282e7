//! Command-line interface.
//!
//! Loads the configured extensions and lets developers inspect them without
//! a UI attached: list what got registered, fetch a source's form and submit
//! values to it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::config::Config;
use crate::extensions::{read_manifest, ExtensionKind, ExtensionRegistry, TracingNotifier};
use crate::logging;

#[derive(Parser, Debug)]
#[command(name = "castkit")]
#[command(about = "Sandboxed extension host for podcast sources", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: <config dir>/castkit/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Locale reported to extensions (e.g. 'de-DE')
    #[arg(long, global = true, value_name = "TAG")]
    pub locale: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load all extensions and print them with their sources
    List,

    /// Print the form a source asks for
    Form {
        /// Extension id
        provider: String,
        /// Source id
        source: String,
    },

    /// Submit form values to a source and print the result
    Submit {
        /// Extension id
        provider: String,
        /// Source id
        source: String,
        /// Form values as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Validate the manifest of an extension directory
    Check {
        /// Path to extension directory (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Load the config the CLI flags point at.
pub fn load_config(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    if let Some(locale) = &cli.locale {
        config.general.locale = locale.clone();
    }
    config
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli);
    logging::init(&config.logging)?;

    if let Commands::Check { path } = &cli.command {
        let descriptor = read_manifest(path, ExtensionKind::External)
            .with_context(|| format!("{} is not a valid extension", path.display()))?;
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
        return Ok(());
    }

    let mut registry = ExtensionRegistry::new(config.registry_config(), Arc::new(TracingNotifier));
    registry.load_all().await;

    match cli.command {
        Commands::List => print_registry(&registry),
        Commands::Form { provider, source } => {
            let fields = registry
                .pre_form(&provider, &source)
                .await
                .with_context(|| format!("preForm of {provider}/{source} failed"))?;
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        Commands::Submit {
            provider,
            source,
            data,
        } => {
            let params = match serde_json::from_str(&data).context("--data is not valid JSON")? {
                Value::Object(params) => params,
                _ => bail!("--data must be a JSON object"),
            };
            let result = registry
                .post_form(&provider, &source, params)
                .await
                .with_context(|| format!("postForm of {provider}/{source} failed"))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Check { .. } => {}
    }

    registry.shutdown();
    Ok(())
}

fn print_registry(registry: &ExtensionRegistry) {
    let extensions = registry.extensions();
    if extensions.is_empty() {
        println!("No extensions loaded.");
        return;
    }

    let sources = registry.sources();
    for extension in extensions {
        println!(
            "{} {} ({}, {})",
            extension.id,
            extension.version,
            extension.kind,
            extension.install_root.display()
        );
        for source in sources.by_provider(&extension.id) {
            match &source.description {
                Some(description) => println!("  - {}: {} ({description})", source.id, source.name),
                None => println!("  - {}: {}", source.id, source.name),
            }
        }
    }
}
