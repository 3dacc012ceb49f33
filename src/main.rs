use anyhow::{bail, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voicebridge::cli::{Cli, Commands};
use voicebridge::config::Config;
use voicebridge::engines::synthesizer::ToneSynthesizer;
use voicebridge::engines::translator::MockTranslator;
use voicebridge::link::loopback::{default_script, LoopbackLink};
use voicebridge::session::{SessionController, SessionHandle};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!(version = %voicebridge::version_string(), "voicebridge");

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)?.with_env_overrides();
    apply_cli_overrides(&mut config, &cli);

    match cli.command {
        Some(Commands::CheckConfig) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Simulate { duration }) => run_simulation(config, duration).await,
        None => {
            bail!(
                "no link backend is wired into this binary; \
                 use `voicebridge simulate` or embed the crate with a Link implementation"
            );
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "voicebridge=info",
        1 => "voicebridge=debug",
        _ => "voicebridge=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(device) = &cli.device {
        config.link.device_name = device.clone();
    }
    if let Some(lang) = &cli.source_language {
        config.translation.source_language = lang.clone();
    }
    if let Some(lang) = &cli.target_language {
        config.translation.target_language = lang.clone();
    }
    if let Some(dir) = &cli.dump_dir {
        config.pipeline.dump_dir = Some(dir.clone());
    }
}

/// Run the full relay against the in-process loopback peripheral.
async fn run_simulation(config: Config, duration: Duration) -> Result<()> {
    let link = LoopbackLink::new()
        .with_script(default_script())
        .with_repeat_interval(Duration::from_secs(3));
    let loopback = link.handle();

    let controller = SessionController::new(
        config,
        Arc::new(MockTranslator::new().with_result("你好，世界", "hello, world")),
        Arc::new(ToneSynthesizer::default()),
    );
    let session = controller.start(Box::new(link))?;
    info!(duration = ?duration, "simulation running, press Ctrl+C to stop early");

    let failed = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
            false
        }
        res = wait_for_sigterm() => {
            res?;
            info!("received SIGTERM, shutting down");
            false
        }
        _ = tokio::time::sleep(duration) => {
            info!("simulation finished");
            false
        }
        _ = wait_until_failed(&session) => true,
    };

    let status = session.status();
    session.stop();
    info!(
        segments = status.stats.segments,
        overload_drops = status.stats.overload_drops,
        audio_bytes = loopback.audio_bytes_written(),
        command_writes = loopback.command_writes(),
        "simulation summary"
    );
    if failed {
        bail!("session failed: link could not be recovered");
    }
    Ok(())
}

async fn wait_until_failed(session: &SessionHandle) {
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if session.is_failed() {
            return;
        }
    }
}

/// Wait for SIGTERM signal (used by systemd).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    // On non-Unix, just wait forever (Ctrl+C will still work)
    std::future::pending::<()>().await
}
