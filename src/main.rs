//! Face Tracking Studio CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use face_tracking_studio::cli::{
    app::{load_merged_config, run_session, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
    SessionOptions,
};
use face_tracking_studio::domain::config::AppConfig;
use face_tracking_studio::domain::recording::ClipLength;
use face_tracking_studio::infrastructure::XdgConfigStore;

fn init_logging(verbose: bool) {
    let default = if verbose {
        "face_tracking_studio=debug"
    } else {
        "face_tracking_studio=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let presenter = Presenter::new();

    // Handle subcommands
    if let Some(Commands::Config { action }) = cli.command {
        let store = XdgConfigStore::new();
        if let Err(e) = handle_config_command(action, &store, &presenter).await {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
        return ExitCode::SUCCESS;
    }

    let duration = match cli.duration.as_deref().map(str::parse::<ClipLength>) {
        None => ClipLength::default(),
        Some(Ok(length)) => length,
        Some(Err(e)) => {
            presenter.error(&format!("Invalid duration: {}", e));
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    // Build CLI config from args
    let cli_config = AppConfig {
        device: cli.device,
        model_dir: cli.model_dir.map(|p| p.to_string_lossy().into_owned()),
        model_url: cli.model_url,
        output_dir: cli.output_dir.map(|p| p.to_string_lossy().into_owned()),
        audio: if cli.no_audio { Some(false) } else { None },
        notify: if cli.notify { Some(true) } else { None },
        ..Default::default()
    };

    let config = load_merged_config(cli_config).await;
    let options = SessionOptions {
        duration,
        notify: config.notify_or_default(),
    };

    run_session(options, config).await
}
