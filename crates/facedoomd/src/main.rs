use anyhow::Result;
use facedoom_core::{ExpressionClassifier, Resolution};
use facedoom_hw::{DeviceCatalog, NodeAccess, OsfTracker, V4lCatalog};
use facedoom_shell::{
    CaptureSession, ControlEvent, FaceControl, IconRenderer, RenderCoordinator, SerialQueue,
    Settings, TomlStore,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zbus::object_server::SignalEmitter;

mod config;
mod dbus_interface;
mod sink;

use dbus_interface::{FaceControlService, BUS_NAME, OBJECT_PATH};
use sink::SignalSink;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facedoomd starting");
    let config = config::Config::from_env();

    let store = Arc::new(TomlStore::open(&config.settings_path)?);
    let settings = Settings::load(store.as_ref());
    tracing::info!(
        path = %store.path().display(),
        face_control = settings.face_control_enabled,
        dock_render = settings.dock_render_enabled,
        "settings loaded"
    );

    let (sink, mut codes) = SignalSink::new();
    let sink = Arc::new(sink);
    let classifier = Arc::new(ExpressionClassifier::new(sink.clone()));

    let catalog: Arc<dyn DeviceCatalog> = Arc::new(V4lCatalog);
    let tracker = OsfTracker::new(config.tracker.clone());
    tracing::info!(
        program = %config.tracker.program,
        port = config.tracker.port,
        "face tracker configured"
    );
    let capture = CaptureSession::new(
        Box::new(tracker),
        Arc::clone(&catalog),
        classifier,
        config.detection_interval,
    )?;

    if let Some(dir) = config.icon_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let render = Arc::new(RenderCoordinator::new(
        Resolution::DOOMGENERIC,
        None,
        SerialQueue::new("facedoom-present")?,
        Arc::new(IconRenderer::new(&config.icon_path, config.icon_size)),
    ));

    let control = Arc::new(FaceControl::new(
        store,
        capture,
        catalog,
        Arc::new(NodeAccess),
        Arc::clone(&render),
    ));
    let mut events = control.subscribe();
    {
        let control = Arc::clone(&control);
        tokio::task::spawn_blocking(move || control.restore(&settings)).await?;
    }

    let service = FaceControlService::new(Arc::clone(&control), render, Arc::clone(&sink));
    let conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await?;
    let iface = conn
        .object_server()
        .interface::<_, FaceControlService>(OBJECT_PATH)
        .await?;
    let emitter = iface.signal_emitter();

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "facedoomd ready");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            Some(code) = codes.recv() => emit_expression(emitter, code).await,
            Ok(event) = events.recv() => emit_event(emitter, event).await,
            res = &mut shutdown => {
                res?;
                break;
            }
        }
    }

    tracing::info!("facedoomd shutting down");
    {
        let control = Arc::clone(&control);
        tokio::task::spawn_blocking(move || control.shutdown()).await?;
    }
    // Deliver the disabled code emitted by the shutdown.
    while let Ok(code) = codes.try_recv() {
        emit_expression(emitter, code).await;
    }

    Ok(())
}

async fn emit_expression(emitter: &SignalEmitter<'_>, code: i32) {
    tracing::trace!(code, "expression");
    if let Err(e) = FaceControlService::expression_changed(emitter, code).await {
        tracing::warn!(error = %e, "failed to emit ExpressionChanged");
    }
}

async fn emit_event(emitter: &SignalEmitter<'_>, event: ControlEvent) {
    let result = match &event {
        ControlEvent::StateChanged { enabled } => {
            FaceControlService::state_changed(emitter, *enabled).await
        }
        ControlEvent::CameraChanged { unique_id } => {
            FaceControlService::camera_changed(emitter, unique_id).await
        }
        ControlEvent::DockRenderChanged { enabled } => {
            FaceControlService::dock_render_changed(emitter, *enabled).await
        }
    };
    if let Err(e) = result {
        tracing::warn!(?event, error = %e, "failed to emit control signal");
    }
}
