mod cli;
mod config;
mod console;
mod error;
mod monitoring;
mod notify;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use clap::Parser;
use logger::LevelFilter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use cli::Cli;
use config::Config;
use console::ConsoleReporter;
use monitoring::validation::validate_monitor_settings;
use monitoring::{Classifier, Poller, SystemProber};
use notify::{Dispatcher, EmailChannel, SmsChannel};

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file
    let _ = dotenvy::dotenv();
    logger::init_with_level(LevelFilter::WARN);

    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_deref()).context("Failed to load config")?;
    config.apply_env_overrides();
    cli.apply(&mut config);
    debug!("{}", config);

    let settings = &config.monitor;
    validate_monitor_settings(settings)?;

    let dispatcher = build_dispatcher(&cli, &config)?;
    info!(channels = ?dispatcher.channel_names(), "Notification channels ready");

    let prober = SystemProber::new(settings.local_host.clone())?
        .with_ping_program(&settings.ping_program);
    let prober = Arc::new(prober);
    let classifier = Classifier::new(prober, settings.mode)
        .with_connectivity_host(settings.connectivity_host.clone())
        .with_disambiguation(settings.disambiguate)
        .with_connectivity_cache(settings.cache_connectivity);

    let poller = Poller::new(
        settings.hosts.clone(),
        classifier,
        Arc::new(dispatcher),
        Box::new(ConsoleReporter::stdout(!cli.no_color)),
        Duration::from_secs(settings.interval_seconds),
    );

    poller.run(shutdown_signal()).await;

    Ok(())
}

fn build_dispatcher(cli: &Cli, config: &Config) -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new();

    if let Some(to) = cli.email_recipient(config)? {
        let channel = EmailChannel::new(&config.email, &to).context("Email channel unusable")?;
        dispatcher = dispatcher.with_channel(Arc::new(channel));
    }

    if let Some(to) = cli.sms_recipient(config)? {
        let channel = SmsChannel::new(&config.sms, &to).context("SMS channel unusable")?;
        dispatcher = dispatcher.with_channel(Arc::new(channel));
    }

    Ok(dispatcher)
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C, running until killed: {}", e);
        std::future::pending::<()>().await;
    }
}
