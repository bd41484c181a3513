#![doc = include_str!("../README.md")]

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use gfonts::{ClientConfig, Dispatcher, FontInstance, Session, TaskError, TaskListener};

mod output;

#[derive(Parser, Debug)]
#[command(name = "gfonts")]
#[command(about = "Browse Google Fonts and download merged font files")]
struct Args {
    /// Font catalog endpoint
    #[arg(long, env = "GFONTS_METADATA_URL")]
    metadata_url: Option<String>,

    /// CSS API endpoint
    #[arg(long, env = "GFONTS_CSS_URL")]
    css_url: Option<String>,

    /// User agent sent with every request (decides which font formats are served)
    #[arg(long, env = "GFONTS_USER_AGENT")]
    user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "GFONTS_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the families in the catalog
    Families {
        /// Only list families whose name contains this (case-insensitive)
        #[arg(long, short = 'f')]
        filter: Option<String>,
    },

    /// List the weights a family is available in
    Weights { family: String },

    /// Download a family and merge its subsets into TrueType files
    Fetch {
        family: String,

        /// Weight token from `gfonts weights`, e.g. 400 or 700i
        #[arg(long, short = 'w')]
        weight: Option<String>,

        /// Output directory for merged fonts
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(url) = &self.metadata_url {
            config.metadata_url = url.clone();
        }
        if let Some(url) = &self.css_url {
            config.css_url = url.clone();
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// Writes each merged font as soon as the selection completes
struct FontWriter {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
    failure: Option<color_eyre::Report>,
}

impl FontWriter {
    fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            written: Vec::new(),
            failure: None,
        }
    }
}

impl TaskListener<Vec<FontInstance>> for FontWriter {
    fn on_result(&mut self, instances: Vec<FontInstance>) {
        let with_style = instances.len() > 1;
        for instance in &instances {
            tracing::info!(
                family = %instance.family,
                name = %instance.name,
                normalized_weight = ?instance.normalized_weight,
                italic = instance.italic,
                "Merged {} ({} bytes)",
                instance.key,
                instance.data.len()
            );
            match output::write_instance(instance, &self.output_dir, with_style) {
                Ok(path) => self.written.push(path),
                Err(e) => {
                    self.failure = Some(e);
                    return;
                }
            }
        }
    }

    fn on_error(&mut self, error: TaskError) {
        tracing::debug!("{}", error.trace);
        self.failure = Some(color_eyre::Report::new(error));
    }

    fn on_finished(&mut self) {
        tracing::debug!("Selection finished");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    tracing::info!(?args, "Starting gfonts");

    let session =
        Arc::new(Session::new(args.client_config()).wrap_err("Failed to set up HTTP client")?);
    let dispatcher = Dispatcher::current();

    match args.command {
        Command::Families { filter } => {
            let catalog = load_catalog(&dispatcher, &session).await?;
            let filter = filter.map(|f| f.to_lowercase());
            for family in catalog.family_names() {
                if filter
                    .as_deref()
                    .is_none_or(|f| family.to_lowercase().contains(f))
                {
                    println!("{family}");
                }
            }
        }
        Command::Weights { family } => {
            let catalog = load_catalog(&dispatcher, &session).await?;
            let weights = catalog
                .weights(&family)
                .ok_or_else(|| eyre!("Family {family:?} is not in the catalog"))?;
            for weight in weights {
                println!("{weight}");
            }
        }
        Command::Fetch {
            family,
            weight,
            output,
        } => {
            let selection = {
                let session = Arc::clone(&session);
                let family = family.clone();
                dispatcher.dispatch_selection("load_selection", async move {
                    session.load_selection(&family, weight.as_deref()).await
                })
            };

            let mut writer = FontWriter::new(output.unwrap_or_else(|| PathBuf::from(".")));
            selection.deliver(&mut writer).await;
            if let Some(failure) = writer.failure {
                return Err(failure).wrap_err_with(|| format!("Failed to fetch {family:?}"));
            }
            for path in &writer.written {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

async fn load_catalog(
    dispatcher: &Dispatcher,
    session: &Arc<Session>,
) -> Result<Arc<gfonts::Catalog>> {
    let session = Arc::clone(session);
    dispatcher
        .dispatch("load_catalog", async move { session.load_catalog().await })
        .outcome()
        .await
        .wrap_err("Failed to load the font catalog")
}
