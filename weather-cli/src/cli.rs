use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, Text};
use weather_core::{Config, ProviderId, WeatherService};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,
    },

    /// Set the failover order, most preferred provider first.
    Order {
        /// Provider short names, e.g. `weatherapi openweather`.
        #[arg(required = true)]
        providers: Vec<String>,
    },

    /// Show current weather for a place.
    Show {
        /// Place name, e.g. "London".
        place: String,

        /// Print cache statistics after the lookup.
        #[arg(long)]
        stats: bool,
    },

    /// Describe the assembled provider chain.
    Info,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Order { providers } => set_order(&providers),
            Command::Show { place, stats } => show(&place, stats).await,
            Command::Info => info().await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let current_url =
        config.provider_config(id).and_then(|p| p.base_url.clone()).unwrap_or_default();
    let base_url = Text::new("Custom base URL (leave empty for the public endpoint):")
        .with_initial_value(&current_url)
        .prompt()
        .context("Failed to read base URL")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    if let Some(entry) = config.providers.get_mut(id.as_str()) {
        let base_url = base_url.trim();
        entry.base_url = (!base_url.is_empty()).then(|| base_url.to_string());
    }

    if config.provider_order.first().map(String::as_str) != Some(id.as_str()) {
        let primary = Confirm::new(&format!("Try {id} first?"))
            .with_default(false)
            .prompt()
            .context("Failed to read answer")?;
        if primary {
            config.promote_provider(id);
        }
    }
    config.save()?;

    println!("Saved credentials for {id}. Failover order: {}", config.provider_order.join(" -> "));
    Ok(())
}

fn set_order(providers: &[String]) -> anyhow::Result<()> {
    let order = providers
        .iter()
        .map(|p| ProviderId::try_from(p.as_str()))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut config = Config::load()?;
    config.set_provider_order(&order);
    config.resolve()?;
    config.save()?;

    for id in &order {
        if !config.is_provider_configured(*id) {
            println!("Note: {id} has no API key and will be skipped. Run `weather configure {id}`.");
        }
    }
    println!("Failover order: {}", config.provider_order.join(" -> "));
    Ok(())
}

async fn service() -> anyhow::Result<WeatherService> {
    let config = Config::load()?.resolve()?;
    WeatherService::from_config(config)
        .await
        .context("Failed to set up weather providers (hint: run `weather configure <provider>`)")
}

async fn show(place: &str, stats: bool) -> anyhow::Result<()> {
    let service = service().await?;
    let result = service.query(place).await;

    if stats {
        match service.cache_statistics() {
            Ok(stats) => eprintln!("{}", serde_json::to_string_pretty(&stats)?),
            Err(err) => eprintln!("{err}"),
        }
    }
    service.shutdown().await;

    let observation = result.with_context(|| format!("Could not get weather for '{place}'"))?;
    println!("Weather for {place}");
    println!("  {}", observation.description());
    println!("  Temperature: {:.1} °C", observation.temperature());
    println!("  Humidity:    {:.0} %", observation.humidity());
    Ok(())
}

async fn info() -> anyhow::Result<()> {
    let service = service().await?;
    println!("{}", serde_json::to_string_pretty(&service.provider_info())?);
    service.shutdown().await;
    Ok(())
}
