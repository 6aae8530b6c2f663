//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands, SystemCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::SqliteService;
use crate::domain::capture::{
    CaptureContext, CaptureLayer, CaptureSettings, CorrelationRegistry, Dispatcher,
    HandlerRegistry, PathFilter, SqliteSink, local_hostname,
};

/// Slot for the capture layer, filled once the database is up
type CaptureSlot = reload::Handle<Option<CaptureLayer>, Layered<EnvFilter, Registry>>;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<SqliteService>,
    pub dispatcher: Arc<Dispatcher>,
    pub filter: Arc<PathFilter>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        let capture_slot = Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::System {
                command: system_cmd,
            }) => {
                return Self::handle_system_command(system_cmd);
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        if app.dispatcher.settings().is_enabled() {
            capture_slot
                .reload(Some(CaptureLayer::new(Arc::clone(&app.dispatcher))))
                .context("Failed to install capture layer")?;
        }
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        let database = Arc::new(
            SqliteService::init(&storage)
                .await
                .context("Failed to initialize database")?,
        );

        let dispatcher = Arc::new(Self::build_dispatcher(&config, &database));
        let filter = Arc::new(PathFilter::new(&config.capture.exclude));
        let shutdown = ShutdownService::new(database.clone());

        Ok(Self {
            config,
            storage,
            database,
            dispatcher,
            filter,
            shutdown,
        })
    }

    fn build_dispatcher(config: &AppConfig, database: &SqliteService) -> Dispatcher {
        let settings = CaptureSettings {
            debug: config.debug,
            error_record: config.capture.error_record,
            only_route: config.capture.only_route,
        };
        let context = CaptureContext::new(
            Arc::new(CorrelationRegistry::new()),
            local_hostname(),
            config.capture.model_marker.as_str(),
        );
        let registry = Arc::new(HandlerRegistry::with_defaults());
        tracing::debug!(handlers = registry.len(), ?settings, "Capture dispatcher ready");

        Dispatcher::new(
            registry,
            Arc::new(SqliteSink::new(database.pool().clone())),
            context,
            settings,
        )
    }

    fn handle_system_command(cmd: SystemCommands) -> Result<()> {
        match cmd {
            SystemCommands::Prune { yes } => Self::prune_data(yes),
        }
    }

    fn prune_data(skip_confirm: bool) -> Result<()> {
        let data_dir = AppStorage::resolve_data_dir();

        if !data_dir.exists() {
            println!("Nothing to prune: {} does not exist", data_dir.display());
            return Ok(());
        }

        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        println!("Every captured entry under this directory will be deleted:");
        println!("  {}", data_dir.display());
        println!();
        println!("Stop the server first. Pruning while it runs corrupts the database.");

        if !skip_confirm {
            print!("\nContinue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Aborted.");
                return Ok(());
            }
        }

        std::fs::remove_dir_all(&data_dir)
            .with_context(|| format!("Failed to delete data directory: {}", data_dir.display()))?;
        println!("Pruned: {}", data_dir.display());
        Ok(())
    }

    /// Console logging plus an empty slot for the capture layer.
    ///
    /// Capture needs the database, which needs the config, which logs while
    /// loading. The slot lets logging start first.
    fn init_logging() -> CaptureSlot {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        let (capture, slot) = reload::Layer::new(None);

        tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(capture)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_level(true)
                    .with_ansi(true)
                    .compact(),
            )
            .init();

        slot
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        banner::print_banner(&app.config, &app.storage.data_dir().display().to_string());

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        tracing::debug!("Background tasks started");
    }
}
