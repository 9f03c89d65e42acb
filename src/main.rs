#![forbid(unsafe_code)]

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use vatcalc::adapter::{DocumentStore, PersistenceAdapter, TableStore};
use vatcalc::config::{AppConfig, BackendKind};
use vatcalc::persistence::FallbackStore;
use vatcalc::settings::{SettingsPatch, SocialPlatform};
use vatcalc::sync::{SaveOutcome, SettingsSynchronizer};
use vatcalc::vat::{self, VatMode};

#[derive(Parser)]
#[command(name = "vatcalc")]
#[command(about = "VAT calculator and website settings console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add VAT to a net price or take it out of a total
    Vat {
        #[arg(long)]
        amount: f64,
        /// Rate in percent
        #[arg(long)]
        rate: f64,
        #[arg(long, value_enum, default_value_t = VatMode::Add)]
        mode: VatMode,
    },
    /// Inspect or edit the website settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Change one or more fields
    Set(SetArgs),
    ToggleMaintenance,
    DeleteLogo,
    /// Clear the hero heading and description
    ResetHero,
    AddSocial {
        platform: SocialPlatform,
        url: String,
    },
    RemoveSocial {
        id: String,
    },
    /// List supported social platforms
    Platforms,
}

#[derive(Args)]
struct SetArgs {
    #[arg(long)]
    title: Option<String>,
    /// Data URI or image URL; empty string removes the logo
    #[arg(long)]
    logo: Option<String>,
    #[arg(long, value_enum)]
    maintenance: Option<Switch>,
    #[arg(long)]
    hero_heading: Option<String>,
    #[arg(long)]
    hero_description: Option<String>,
    #[arg(long)]
    homepage_content: Option<String>,
    #[arg(long)]
    footer_top_content: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl SetArgs {
    fn into_patch(self) -> SettingsPatch {
        SettingsPatch {
            maintenance_mode: self.maintenance.map(|m| matches!(m, Switch::On)),
            website_title: self.title.map(|t| t.trim().to_string()),
            website_logo: self.logo.map(|logo| {
                let logo = logo.trim().to_string();
                (!logo.is_empty()).then_some(logo)
            }),
            social_links: None,
            homepage_content: self.homepage_content,
            footer_top_content: self.footer_top_content,
            hero_heading: self.hero_heading,
            hero_description: self.hero_description,
        }
    }
}

fn init_logging(config_level: &str) -> Result<()> {
    // LOG_LEVEL wins over the config file
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| config_level.to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_adapter(config: &AppConfig) -> Result<Arc<dyn PersistenceAdapter>> {
    let path = config.store_file();
    info!(backend = ?config.backend, path = %path.display(), "Opening settings store");

    let adapter: Arc<dyn PersistenceAdapter> = match config.backend {
        BackendKind::Document => Arc::new(DocumentStore::open(path)?),
        BackendKind::Table => Arc::new(TableStore::open(path)?),
    };
    Ok(adapter)
}

fn report(outcome: SaveOutcome) {
    match outcome {
        SaveOutcome::Remote => println!("Saved."),
        SaveOutcome::LocalOnly => println!("Remote store unavailable, saved locally."),
    }
}

fn print_platforms() {
    for platform in SocialPlatform::ALL {
        println!(
            "{:<10} {:<10} {}  {}",
            platform.key(),
            platform.display_name(),
            platform.brand_color(),
            platform.url_placeholder()
        );
    }
}

async fn run_settings(sync: &SettingsSynchronizer, action: SettingsCommand) -> Result<()> {
    match action {
        SettingsCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&sync.read())?);
        }
        SettingsCommand::Set(args) => {
            let patch = args.into_patch();
            if patch.is_empty() {
                println!("Nothing to change.");
                return Ok(());
            }
            report(sync.save(patch).await?);
        }
        SettingsCommand::ToggleMaintenance => {
            report(sync.toggle_maintenance_mode().await?);
            let state = if sync.read().maintenance_mode { "on" } else { "off" };
            println!("Maintenance mode is {state}.");
        }
        SettingsCommand::DeleteLogo => report(sync.delete_website_logo().await?),
        SettingsCommand::ResetHero => report(sync.reset_hero().await?),
        SettingsCommand::AddSocial { platform, url } => {
            let (link, outcome) = sync.add_social_link(platform, &url).await?;
            report(outcome);
            println!("Added {} link {} ({})", platform.display_name(), link.id, link.url);
        }
        SettingsCommand::RemoveSocial { id } => report(sync.remove_social_link(&id).await?),
        SettingsCommand::Platforms => print_platforms(),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let action = match cli.command {
        Command::Vat { amount, rate, mode } => {
            println!("{}", vat::calculate(amount, rate, mode)?);
            return Ok(());
        }
        Command::Settings {
            action: SettingsCommand::Platforms,
        } => {
            print_platforms();
            return Ok(());
        }
        Command::Settings { action } => action,
    };

    let config = AppConfig::load()?;
    init_logging(&config.log_level)?;

    let sync = SettingsSynchronizer::new(
        build_adapter(&config)?,
        FallbackStore::new(config.fallback_file()),
        config.sync_options(),
    );
    let consumer = sync.mount().await;
    if !consumer.remote_available() {
        eprintln!("Remote store unavailable, working from local settings.");
    }

    let result = run_settings(&sync, action).await;

    consumer.unmount();
    sync.teardown().await;
    result
}
