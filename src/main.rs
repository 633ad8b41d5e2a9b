use anyhow::Result;
use hostwatch::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Background tasks and the senders that stop them.
#[derive(Default)]
struct Tasks {
    handles: Vec<tokio::task::JoinHandle<()>>,
    shutdown: Vec<oneshot::Sender<()>>,
}

impl Tasks {
    fn shutdown_rx(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.shutdown.push(tx);
        rx
    }

    async fn stop(self) {
        for tx in self.shutdown {
            let _ = tx.send(());
        }
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        role = ?app_config.role,
        version = version::VERSION,
        "Starting {}",
        version::NAME
    );

    let (metrics_tx, _) = broadcast::channel::<Arc<models::SystemMetrics>>(
        app_config.monitoring.broadcast_capacity,
    );
    let store = Arc::new(store::MetricStore::new());

    let docker_repo = docker_repo::DockerRepo::connect_available().await.map(Arc::new);
    if docker_repo.is_none() {
        tracing::info!("Docker not available; container metrics disabled");
    }

    let pool = db::connect(&app_config.database.path).await?;
    let history_repo = Arc::new(history_repo::HistoryRepo::new(pool.clone()));
    history_repo.init().await?;

    let router = match app_config.role {
        config::Role::Hub => {
            let systems = systems_repo::SystemsRepo::new(pool.clone());
            systems.init().await?;
            let pull = pull_client::PullClient::new(Duration::from_millis(app_config.pull.timeout_ms))?;
            Some(identity::ModeRouter::new(
                store.clone(),
                systems,
                pull,
                Some(app_config.auth.api_key.clone()),
            ))
        }
        config::Role::Agent => None,
    };

    let disk_usage = Arc::new(disk_usage::DiskUsageCache::new(
        &app_config.disk_usage.path,
        app_config.disk_usage.top_n,
    ));

    let ws_metrics_connections = Arc::new(AtomicUsize::new(0));
    let mut tasks = Tasks::default();

    let sysinfo = Arc::new(sysinfo_repo::SysinfoRepo::new());
    let sampler = sampler::Sampler::new(sysinfo, docker_repo.clone());
    let shutdown_rx = tasks.shutdown_rx();
    tasks.handles.push(worker::spawn(
        worker::WorkerDeps {
            sampler,
            store: store.clone(),
            tx: metrics_tx.clone(),
            ws_metrics_connections: ws_metrics_connections.clone(),
            samples_total: Arc::new(AtomicU64::new(0)),
            shutdown_rx,
        },
        worker::WorkerConfig {
            sample_interval_ms: app_config.monitoring.sample_interval_ms,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
            max_entry_age_secs: app_config.store.max_entry_age_secs,
        },
    ));

    let shutdown_rx = tasks.shutdown_rx();
    tasks.handles.push(tokio::spawn(disk_usage::run_refresher(
        disk_usage.clone(),
        Duration::from_secs(app_config.disk_usage.refresh_interval_secs),
        shutdown_rx,
    )));

    let shutdown_rx = tasks.shutdown_rx();
    tasks.handles.push(disk_history_worker::spawn(
        store.clone(),
        history_repo.clone(),
        disk_history_worker::DiskHistoryConfig {
            schedule: app_config.disk_usage.snapshot_schedule.clone(),
            interval_secs: app_config.disk_usage.snapshot_interval_secs,
        },
        shutdown_rx,
    ));

    match app_config.push {
        Some(ref push) => {
            let push_config = pusher::PushConfig {
                server_url: url::Url::parse(&push.server_url)?,
                api_key: push.api_key.clone(),
                interval_ms: push.interval_ms,
            };
            let pusher = pusher::Pusher::new(&push_config, store.clone())?;
            let shutdown_rx = tasks.shutdown_rx();
            tasks
                .handles
                .push(pusher::spawn(pusher, push_config.interval_ms, shutdown_rx));
        }
        None if app_config.role == config::Role::Agent => {
            tracing::info!("Push mode disabled: no [push] section or SERVER_URL");
        }
        None => {}
    }

    let app = routes::app(routes::AppDeps {
        api_key: app_config.auth.api_key.clone(),
        store,
        metrics_tx,
        ws_metrics_connections,
        disk_usage,
        history_repo,
        docker_repo,
        router,
    });
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            tasks.stop().await;
        }
    }

    Ok(())
}
