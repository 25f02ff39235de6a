//! Glass TUI Entry Point
//!
//! Launches the card timeline emulator in the terminal.
//!
//! Usage:
//!   glass-tui [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Config file (default: ~/.config/glass/emulator.toml)
//!   --base-url <URL>         Timeline service base URL
//!   --access-token <TOKEN>   Bearer token for the service
//!   --sync-mode <MODE>       poll or push
//!   --poll-interval <SECS>   Seconds between timeline polls
//!   --demo                   Use the built-in demo timeline
//!   --latitude/--longitude   Fixed device position
//!   --log-file <PATH>        Write logs here (the screen belongs to the TUI)

use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glass_core::{
    default_config_path, load_config_from_path, ConfigOverrides, EmulatorConfig, FixedGeolocator,
    Geolocator, Location, SyncMode,
};
use glass_tui::{App, EmulatorClient};

/// Default log filter when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "glass_core=info,glass_tui=info";

#[derive(Parser, Debug)]
#[command(name = "glass-tui")]
#[command(about = "Terminal emulator for a Glass-style card timeline")]
struct Args {
    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Timeline service base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for the timeline service
    #[arg(long)]
    access_token: Option<String>,

    /// Sync mode: poll or push
    #[arg(long)]
    sync_mode: Option<SyncMode>,

    /// Seconds between timeline polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Use the built-in demo timeline instead of a service
    #[arg(long)]
    demo: bool,

    /// Device latitude
    #[arg(long, requires = "longitude", allow_hyphen_values = true)]
    latitude: Option<f64>,

    /// Device longitude
    #[arg(long, requires = "latitude", allow_hyphen_values = true)]
    longitude: Option<f64>,

    /// Log file
    #[arg(long, env = "GLASS_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(url) = &self.base_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(token) = &self.access_token {
            overrides = overrides.with_access_token(token.clone());
        }
        if let Some(mode) = self.sync_mode {
            overrides = overrides.with_sync_mode(mode);
        }
        if let Some(secs) = self.poll_interval {
            overrides = overrides.with_poll_interval_secs(secs);
        }
        if self.demo {
            overrides = overrides.with_demo(true);
        }
        overrides
    }

    fn geolocator(&self) -> Arc<dyn Geolocator> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Arc::new(FixedGeolocator::new(Location::at(lat, lon))),
            _ => Arc::new(FixedGeolocator::unavailable()),
        }
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let writer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(io::sink),
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer),
        )
        .with(filter)
        .init();
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<EmulatorConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up logging
    init_logging(args.log_file.as_ref())?;

    let config = load_config(&args)?;
    tracing::info!(
        source = %config.source(),
        demo = config.demo,
        mode = %config.sync.mode,
        "Configuration loaded"
    );
    let client = EmulatorClient::new(&config, args.geolocator())?;

    // Check if we have a TTY before attempting initialization
    use std::io::IsTerminal;

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: glass-tui requires a terminal (TTY)");
        eprintln!();
        eprintln!("This usually means:");
        eprintln!("  - Running in a non-interactive environment (CI, container)");
        eprintln!("  - SSH without -t flag");
        eprintln!("  - Piped stdin/stdout");
        std::process::exit(1);
    }

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Restore terminal before printing panic
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Run the app
    let mut app = App::new(client);
    let result = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    // Propagate any errors
    result
}
