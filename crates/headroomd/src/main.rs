//! headroomd - Solar surplus load scheduler
//!
//! This is the main entry point for the headroomd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Telemetry refresh loop
//! - Command actuator
//! - Tier scheduler loop
//! - IPC server

mod runner;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use headroom_api::{
    Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, LoadControl, Response,
    ResponsePayload, StopReason,
};
use headroom_config::{load_config, Policy};
use headroom_core::{CoreEvent, TickOutcome, TierScheduler};
use headroom_host_api::{HeadroomSource, LoadActuator};
use headroom_host_linux::{CommandActuator, TelemetryHeadroom};
use headroom_ipc::{IpcServer, ServerMessage};
use headroom_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use headroom_util::{default_config_path, default_data_dir, default_socket_path, ClientId, LoadId, RateLimiter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// headroomd - Run deferrable loads on solar surplus
#[derive(Parser, Debug)]
#[command(name = "headroomd")]
#[command(about = "Run deferrable loads on solar surplus, by priority tier", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/headroomd/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set HEADROOM_SOCKET env var)
    #[arg(short, long, env = "HEADROOM_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set HEADROOM_DATA_DIR env var)
    #[arg(short, long, env = "HEADROOM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Shared handles used by the service loop and its request handlers
#[derive(Clone)]
struct Handles {
    config_path: PathBuf,
    scheduler: Arc<Mutex<TierScheduler>>,
    telemetry: Arc<TelemetryHeadroom>,
    actuator: Arc<CommandActuator>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
}

/// Main service state
struct Service {
    handles: Handles,
    rate_limiter: RateLimiter,
}

fn load_controls(policy: &Policy) -> Vec<(LoadId, LoadControl)> {
    policy
        .loads
        .iter()
        .map(|l| (l.id.clone(), l.control.clone()))
        .collect()
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let policy = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            load_count = policy.loads.len(),
            excluded = policy.excluded_loads().len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .or_else(|| policy.service.socket_path.clone())
            .unwrap_or_else(default_socket_path);

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| policy.service.data_dir.clone())
            .unwrap_or_else(default_data_dir);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("headroomd.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let actuator = Arc::new(CommandActuator::new(load_controls(&policy)));

        // First reading before hydration so the first tick has headroom
        let telemetry = Arc::new(TelemetryHeadroom::new(policy.telemetry.clone()));
        match telemetry.refresh().await {
            Some(headroom_w) => info!(headroom_w, "Telemetry initialized"),
            None => warn!("No headroom reading yet, loads will be shed until one arrives"),
        }

        let mut scheduler = TierScheduler::new(
            policy,
            store.clone(),
            telemetry.clone(),
            actuator.clone(),
        );
        scheduler.hydrate(headroom_util::now()).await;

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        // Rate limiter: 30 requests per second per client
        let rate_limiter = RateLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            handles: Handles {
                config_path: args.config.clone(),
                scheduler: Arc::new(Mutex::new(scheduler)),
                telemetry,
                actuator,
                ipc: Arc::new(ipc),
                store,
            },
            rate_limiter,
        })
    }

    async fn run(mut self) -> Result<()> {
        let handles = self.handles.clone();
        let mut ipc_messages = handles
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ipc_accept = handles.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let telemetry = handles.telemetry.clone();
        let telemetry_shutdown = shutdown_rx.clone();
        let telemetry_task = tokio::spawn(async move { telemetry.run(telemetry_shutdown).await });

        let (outcome_tx, mut outcomes) = mpsc::unbounded_channel::<TickOutcome>();
        let scheduler_task = tokio::spawn(runner::run_scheduler(
            handles.scheduler.clone(),
            outcome_tx,
            shutdown_rx,
        ));

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // SIGHUP: re-read the config file
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading configuration");
                    if let Err(e) = Self::reload(&handles).await {
                        warn!(error = %e, "Reload failed, keeping current configuration");
                    }
                }

                Some(outcome) = outcomes.recv() => {
                    Self::handle_tick_outcome(&handles.ipc, outcome);
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&handles, &mut self.rate_limiter, msg).await;
                }
            }
        }

        info!("Shutting down headroomd");

        // Let an in-progress tick finish before touching loads
        let _ = shutdown_tx.send(true);
        if let Err(e) = scheduler_task.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
        let _ = telemetry_task.await;
        while let Ok(outcome) = outcomes.try_recv() {
            Self::handle_tick_outcome(&handles.ipc, outcome);
        }

        {
            let mut scheduler = handles.scheduler.lock().await;
            if scheduler.policy().service.shed_on_exit {
                info!("Shedding running loads before exit");
                let events = scheduler
                    .shed_all(StopReason::ServiceShutdown, headroom_util::now())
                    .await;
                for event in events {
                    Self::handle_core_event(&handles.ipc, event);
                }
            }
        }

        if let Err(e) = handles
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        handles.ipc.broadcast_event(Event::new(EventPayload::Shutdown));
        // Give writers a moment to flush the shutdown event
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Shutdown complete");
        Ok(())
    }

    /// Re-read the config file and apply it to every component
    async fn reload(handles: &Handles) -> Result<usize> {
        let policy = load_config(&handles.config_path)
            .with_context(|| format!("Failed to load config from {:?}", handles.config_path))?;

        handles.actuator.reload(load_controls(&policy)).await;
        handles.telemetry.set_policy(policy.telemetry.clone()).await;

        let event = handles
            .scheduler
            .lock()
            .await
            .reload(policy, headroom_util::now())
            .await;

        let load_count = match &event {
            CoreEvent::PolicyReloaded { load_count } => *load_count,
            _ => 0,
        };
        Self::handle_core_event(&handles.ipc, event);
        Ok(load_count)
    }

    fn handle_tick_outcome(ipc: &Arc<IpcServer>, outcome: TickOutcome) {
        for event in outcome.events {
            Self::handle_core_event(ipc, event);
        }
        ipc.broadcast_event(Event::new(EventPayload::TickCompleted(outcome.report)));
    }

    fn handle_core_event(ipc: &Arc<IpcServer>, event: CoreEvent) {
        let payload = match event {
            CoreEvent::LoadStarted { load_id, reason, headroom_w } => {
                EventPayload::LoadStarted { load_id, reason, headroom_w }
            }
            CoreEvent::LoadStopped { load_id, reason, ran_secs } => EventPayload::LoadStopped {
                load_id,
                reason,
                ran_secs: Some(ran_secs),
            },
            CoreEvent::QuotaRolledOver { load_id, windows } => {
                EventPayload::QuotaRolledOver { load_id, windows }
            }
            CoreEvent::ExternalStateChanged { load_id, running } => {
                EventPayload::ExternalStateChanged { load_id, running }
            }
            CoreEvent::HeadroomUnavailable { .. } => EventPayload::HeadroomUnavailable,
            CoreEvent::PolicyReloaded { load_count } => EventPayload::PolicyReloaded { load_count },
            // Logged and audited by the scheduler; clients see it in the tick report
            CoreEvent::ActuationFailed { .. } => return,
        };
        ipc.broadcast_event(Event::new(payload));
    }

    async fn handle_ipc_message(
        handles: &Handles,
        rate_limiter: &mut RateLimiter,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                if !rate_limiter.check(&client_id) {
                    let response = Response::error(
                        request.request_id,
                        ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                    );
                    let _ = handles.ipc.send_response(&client_id, response).await;
                    return;
                }

                let response =
                    Self::handle_command(handles, &client_id, request.request_id, request.command)
                        .await;

                if let Err(e) = handles.ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Response not delivered");
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client connected"
                );

                let _ = handles.store.append_audit(AuditEvent::new(
                    AuditEventType::ClientConnected {
                        client_id: client_id.to_string(),
                        role: format!("{:?}", info.role),
                        uid: info.uid,
                    },
                ));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let _ = handles.store.append_audit(AuditEvent::new(
                    AuditEventType::ClientDisconnected {
                        client_id: client_id.to_string(),
                    },
                ));

                rate_limiter.forget(&client_id);
            }
        }
    }

    async fn handle_command(
        handles: &Handles,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        match command {
            Command::GetState => {
                let state = handles.scheduler.lock().await.state_snapshot();
                Response::success(request_id, ResponsePayload::State(state))
            }

            Command::ListLoads => {
                let loads = handles.scheduler.lock().await.load_views();
                Response::success(request_id, ResponsePayload::Loads { loads })
            }

            Command::GetReport => match handles.scheduler.lock().await.last_report() {
                Some(report) => Response::success(request_id, ResponsePayload::Report(report.clone())),
                None => Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::NoReportYet, "No tick has completed yet"),
                ),
            },

            Command::ReloadConfig => {
                let allowed = handles
                    .ipc
                    .get_client_info(client_id)
                    .await
                    .is_some_and(|info| info.role.can_reload_config());
                if !allowed {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"),
                    );
                }

                match Self::reload(handles).await {
                    Ok(load_count) => {
                        Response::success(request_id, ResponsePayload::ConfigReloaded { load_count })
                    }
                    Err(e) => {
                        warn!(error = %e, "Reload requested over IPC failed");
                        Response::error(
                            request_id,
                            ErrorInfo::new(ErrorCode::ConfigError, format!("{:#}", e)),
                        )
                    }
                }
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::UnsubscribeEvents => {
                Response::success(request_id, ResponsePayload::Unsubscribed)
            }

            Command::GetHealth => {
                let ticked = handles.scheduler.lock().await.last_report().is_some();
                let health = HealthStatus {
                    live: true,
                    ready: ticked,
                    store_ok: handles.store.is_healthy(),
                    telemetry_ok: handles.telemetry.is_healthy(),
                    actuator_ok: handles.actuator.is_healthy(),
                };
                Response::success(request_id, ResponsePayload::Health(health))
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "headroomd starting"
    );

    let service = Service::new(&args).await?;
    service.run().await
}
