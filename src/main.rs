use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use widget_sync::{
    drain, DisplayStyle, FileSource, JsonLinesSink, MessageSource, Settings, SnapshotStore,
    StateFile, StreamSource, SyncCoordinator, SyncDriver, WidgetEvent, WidgetId, WidgetRegistry,
};

#[derive(Parser, Debug)]
#[command(name = "widget-sync")]
#[command(about = "Keep home-screen server widgets in sync with versioned metric snapshots")]
struct Args {
    /// JSON file with one message or an array of messages
    #[arg(short, long, default_value = "snapshots.json", conflicts_with_all = ["connect", "stdin"])]
    file: PathBuf,

    /// Connect to a TCP producer sending newline-delimited JSON (host:port)
    #[arg(short, long, conflicts_with_all = ["file", "stdin"])]
    connect: Option<String>,

    /// Read newline-delimited JSON messages from stdin
    #[arg(long, conflicts_with_all = ["file", "connect"])]
    stdin: bool,

    /// Register a widget at startup: <widget_id>=<server_id>[:list|dashboard]
    #[arg(short, long = "widget", value_parser = parse_widget)]
    widgets: Vec<WidgetEvent>,

    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persist the snapshot store to this file (overrides settings)
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Polling interval in seconds (overrides settings)
    #[arg(short, long)]
    refresh: Option<u64>,

    /// Process what the file currently holds, print frames and exit
    #[arg(long)]
    once: bool,
}

/// Parse `7=s1`, `7=s1:dashboard`.
fn parse_widget(raw: &str) -> std::result::Result<WidgetEvent, String> {
    let (id, binding) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <widget_id>=<server_id>[:style], got {:?}", raw))?;
    let widget_id: i32 = id
        .trim()
        .parse()
        .map_err(|e| format!("invalid widget id {:?}: {}", id, e))?;

    let (server, style) = match binding.split_once(':') {
        Some((server, style)) => (server, DisplayStyle::parse(style)),
        None => (binding, DisplayStyle::List),
    };
    if server.trim().is_empty() {
        return Err(format!("missing server id in {:?}", raw));
    }

    Ok(WidgetEvent::Added {
        widget_id: WidgetId(widget_id),
        server_id: server.trim().into(),
        style,
    })
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout carries render frames, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(state) = &args.state {
        settings.state_file = Some(state.clone());
    }
    if let Some(refresh) = args.refresh {
        settings.refresh_secs = refresh;
    }

    init_logging(&settings.log_level);

    let store = Arc::new(SnapshotStore::with_history_depth(settings.history_depth));
    let state_file = settings.state_file.as_ref().map(StateFile::new);
    if let Some(state_file) = &state_file {
        state_file
            .load_into(&store)
            .with_context(|| format!("failed to load state from {}", state_file.path().display()))?;
    }

    let sink = Arc::new(JsonLinesSink::new(std::io::stdout()));
    let coordinator = Arc::new(SyncCoordinator::with_parts(
        store,
        Arc::new(WidgetRegistry::new()),
        sink,
    ));

    for event in args.widgets.iter().cloned() {
        coordinator.handle_event(event);
    }

    if args.once {
        if args.connect.is_some() || args.stdin {
            bail!("--once only works with --file");
        }
        return run_once(&coordinator, &args.file, state_file.as_ref());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let source: Box<dyn MessageSource> = if let Some(addr) = &args.connect {
            let stream = tokio::net::TcpStream::connect(addr)
                .await
                .map_err(|e| anyhow!("Failed to connect to {}: {}", addr, e))?;
            info!(%addr, "connected");
            Box::new(StreamSource::spawn_with_capacity(
                stream,
                addr,
                settings.channel_capacity,
            ))
        } else if args.stdin {
            Box::new(StreamSource::spawn_with_capacity(
                tokio::io::stdin(),
                "stdin",
                settings.channel_capacity,
            ))
        } else {
            Box::new(FileSource::new(&args.file))
        };

        run(coordinator, source, &settings, state_file).await
    })
}

/// Drain the file once, print the frames, save state and exit.
fn run_once(
    coordinator: &SyncCoordinator,
    path: &Path,
    state_file: Option<&StateFile>,
) -> Result<()> {
    let mut source = FileSource::new(path);
    let stats = drain(coordinator, &mut source);
    if let Some(e) = source.error() {
        bail!("{}: {}", source.description(), e);
    }
    info!(?stats, "processed {}", path.display());

    if let Some(state_file) = state_file {
        state_file.save(coordinator.store())?;
    }
    Ok(())
}

/// Run the driver until Ctrl-C.
async fn run(
    coordinator: Arc<SyncCoordinator>,
    source: Box<dyn MessageSource>,
    settings: &Settings,
    state_file: Option<StateFile>,
) -> Result<()> {
    let mut builder = SyncDriver::builder()
        .interval(settings.refresh_interval())
        .save_interval(settings.save_interval());
    if let Some(state_file) = state_file {
        builder = builder.state_file(state_file);
    }

    let handle = builder.build(coordinator).start(source);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    let stats = tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .context("sync driver did not stop in time")?;
    info!(?stats, "done");
    Ok(())
}
