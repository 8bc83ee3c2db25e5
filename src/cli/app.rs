//! Main app runner for a recording session

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, warn};

use crate::application::ports::{ConfigStore, NotificationIcon, Notifier};
use crate::application::{FailureKind, Studio, StudioConfig, StudioEvent, StudioPorts};
use crate::domain::config::AppConfig;
use crate::infrastructure::{
    create_notifier, DirectoryModelSource, DirectorySink, FfmpegCamera, FfmpegEncoderFactory,
    HttpModelSource, MemoryBlobStore, NoOpDetector, XdgConfigStore,
};

use super::args::SessionOptions;
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

const INDICATOR_REFRESH: Duration = Duration::from_millis(250);
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(15);

/// Environment variables read into the config
pub const ENV_DEVICE: &str = "FACE_STUDIO_DEVICE";
pub const ENV_MODEL_URL: &str = "FACE_STUDIO_MODEL_URL";
pub const ENV_OUTPUT_DIR: &str = "FACE_STUDIO_OUTPUT_DIR";

/// Build the studio from config using the FFmpeg adapters
pub fn build_studio(config: &AppConfig) -> Studio {
    let ports = StudioPorts {
        camera: Arc::new(FfmpegCamera::new(config.device.clone())),
        detector: Arc::new(NoOpDetector::new()),
        primary_models: Arc::new(DirectoryModelSource::new(config.model_dir_or_default())),
        fallback_models: Arc::new(HttpModelSource::new(config.model_url_or_default())),
        encoders: Arc::new(FfmpegEncoderFactory::new(
            config.audio_device.clone(),
            config.constraints().audio,
        )),
        blobs: Arc::new(MemoryBlobStore::new()),
    };
    Studio::new(ports, StudioConfig::from(config))
}

/// Open the camera, record one clip, save it and shut down
pub async fn run_session(options: SessionOptions, config: AppConfig) -> ExitCode {
    let mut presenter = Presenter::new();

    let shutdown = ShutdownSignal::new();
    shutdown.setup();

    let studio = build_studio(&config);
    if options.notify {
        forward_notifications(&studio, create_notifier());
    }

    presenter.start_spinner("Opening camera and loading face models...");
    let report = studio.initialize().await;
    let snapshot = studio.snapshot();

    if !report.camera_ready {
        let reason = snapshot
            .camera
            .error_message()
            .unwrap_or("camera unavailable")
            .to_string();
        presenter.spinner_fail(&format!("Camera: {}", reason));
        studio.shutdown().await;
        return ExitCode::from(EXIT_ERROR);
    }

    if report.detecting {
        presenter.spinner_success("Camera ready, tracking faces");
    } else {
        presenter.spinner_success("Camera ready");
        let reason = snapshot.model.to_string();
        presenter.warn(&format!("Face detection disabled: {}", reason));
    }

    let formats = studio.supported_formats().await;
    if formats.is_empty() {
        presenter.warn("No supported recording formats");
    } else {
        let formats: Vec<String> = formats.iter().map(|f| f.to_string()).collect();
        presenter.info(&format!("Supported formats: {}", formats.join(", ")));
    }

    if let Err(e) = studio.start_recording().await {
        presenter.error(&e.to_string());
        studio.shutdown().await;
        return ExitCode::from(EXIT_ERROR);
    }

    presenter.start_spinner(&presenter.format_indicator(0, "0 Faces"));
    record_until_done(&studio, &presenter, &shutdown, options.duration.as_std()).await;

    studio.stop_recording().await;
    presenter.update_spinner("Finalizing recording...");
    if timeout(FINALIZE_TIMEOUT, studio.wait_recording_idle())
        .await
        .is_err()
    {
        warn!("Recording did not finalize in time");
    }
    presenter.stop_spinner();

    let saved = save_artifacts(&studio, &presenter, &config).await;
    studio.shutdown().await;

    if saved == 0 {
        presenter.error("No recording was saved");
        return ExitCode::from(EXIT_ERROR);
    }
    ExitCode::from(EXIT_SUCCESS)
}

async fn record_until_done(
    studio: &Studio,
    presenter: &Presenter,
    shutdown: &ShutdownSignal,
    duration: Duration,
) {
    let deadline = sleep(duration);
    tokio::pin!(deadline);
    let mut refresh = interval(INDICATOR_REFRESH);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let status = studio.recording_status();
    let detections = studio.detections();

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = shutdown.requested() => {
                debug!("Stopping early on Ctrl+C");
                break;
            }
            _ = refresh.tick() => {
                let status = status.borrow().clone();
                if !status.is_recording() {
                    // aborted by the encoder
                    break;
                }
                let faces = detections.borrow().face_count_label();
                presenter.update_indicator(status.elapsed_seconds, &faces);
            }
        }
    }
}

async fn save_artifacts(studio: &Studio, presenter: &Presenter, config: &AppConfig) -> usize {
    let sink = DirectorySink::new(config.output_dir_or_default());
    let mut saved = 0;
    for artifact in studio.artifacts() {
        match studio.download(artifact.id(), &sink).await {
            Ok(path) => {
                presenter.saved(&path.display().to_string(), &artifact);
                saved += 1;
            }
            Err(e) => presenter.error(&e.to_string()),
        }
    }
    saved
}

/// Show studio events as desktop notifications for the life of the studio
fn forward_notifications(studio: &Studio, notifier: Box<dyn Notifier>) {
    let mut events = studio.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some((title, message, icon)) = notification_for(&event) else {
                        continue;
                    };
                    if let Err(e) = notifier.notify(&title, &message, icon).await {
                        debug!(error = %e, "Notification failed");
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Title, body and icon for events worth a notification
fn notification_for(event: &StudioEvent) -> Option<(String, String, NotificationIcon)> {
    match event {
        StudioEvent::Failure { kind, message } if *kind != FailureKind::DetectionCycle => {
            let icon = if kind.is_terminal() {
                NotificationIcon::Error
            } else {
                NotificationIcon::Warning
            };
            Some((kind.title().to_string(), message.clone(), icon))
        }
        StudioEvent::RecordingStarted { mime_type } => Some((
            "Recording started".to_string(),
            mime_type.to_string(),
            NotificationIcon::Recording,
        )),
        StudioEvent::ArtifactCreated(artifact) => Some((
            "Recording finished".to_string(),
            format!(
                "{}, {}",
                artifact.duration_label(),
                artifact.human_readable_size()
            ),
            NotificationIcon::Success,
        )),
        _ => None,
    }
}

/// Config values from `FACE_STUDIO_*` variables
pub fn env_config() -> AppConfig {
    let var = |name: &str| env::var(name).ok().filter(|s| !s.is_empty());
    AppConfig {
        device: var(ENV_DEVICE),
        model_url: var(ENV_MODEL_URL),
        output_dir: var(ENV_OUTPUT_DIR),
        ..Default::default()
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable config file");
            AppConfig::empty()
        }
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}
