#![forbid(unsafe_code)]

mod client;
mod color;
mod config;
mod constants;
mod daemon;
mod debounce;
mod environment;
mod ipc;
mod lifecycle;
mod surface;
mod sync;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::{SettingsPatch, SettingsStore};
use constants::{persistence, ring};
use daemon::DaemonOptions;
use surface::Viewport;

#[derive(Parser, Debug)]
#[command(name = "lum-o-ring", version, about = "Ring light overlay for your screen")]
struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/lum-o-ring/lum-o-ring.json)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Bridge socket (default: $XDG_RUNTIME_DIR/lum-o-ring/bridge.sock)
    #[arg(long, global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start lum-o-ring (the default)
    Run {
        /// Quiet period before continuous edits are written to disk
        #[arg(long, default_value_t = persistence::DEBOUNCE_MS)]
        debounce_ms: u64,

        #[command(flatten)]
        viewport: ViewportArgs,
    },
    /// Print the current settings as JSON
    Get,
    /// Change settings and save them
    Set(SetArgs),
    /// Turn the ring on or off
    Toggle,
    /// Show the gear menu, or activate one of its entries
    Menu {
        /// Entry index to activate
        #[arg(long)]
        activate: Option<usize>,
    },
    OpenSettings,
    CloseSettings,
    Quit,
    /// Follow the ring as a remote surface and print each rendered style
    Watch {
        #[command(flatten)]
        viewport: ViewportArgs,

        /// Print styles as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct ViewportArgs {
    #[arg(long, default_value_t = ring::DEFAULT_VIEWPORT_WIDTH)]
    viewport_width: u32,

    #[arg(long, default_value_t = ring::DEFAULT_VIEWPORT_HEIGHT)]
    viewport_height: u32,
}

impl From<ViewportArgs> for Viewport {
    fn from(args: ViewportArgs) -> Self {
        Viewport::new(args.viewport_width, args.viewport_height)
    }
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Turn the ring on
    #[arg(long, conflicts_with = "off")]
    on: bool,

    /// Turn the ring off
    #[arg(long)]
    off: bool,

    /// Diameter, percent of the shorter screen edge
    #[arg(long, allow_negative_numbers = true)]
    size: Option<i32>,

    /// Stroke width in pixels
    #[arg(long, allow_negative_numbers = true)]
    thickness: Option<i32>,

    /// Opacity percent
    #[arg(long, allow_negative_numbers = true)]
    brightness: Option<i32>,

    /// Glow spread in pixels
    #[arg(long, allow_negative_numbers = true)]
    blur: Option<i32>,

    /// Ring color as #RRGGBB
    #[arg(long)]
    color: Option<String>,

    #[arg(long)]
    custom_color: Option<String>,

    /// Use a preset color by index
    #[arg(long, conflicts_with = "color")]
    preset: Option<usize>,
}

impl From<SetArgs> for client::SetRequest {
    fn from(args: SetArgs) -> Self {
        let is_on = match (args.on, args.off) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        client::SetRequest {
            patch: SettingsPatch {
                is_on,
                size: args.size,
                thickness: args.thickness,
                brightness: args.brightness,
                blur: args.blur,
                color: args.color,
                custom_color: args.custom_color,
            },
            preset: args.preset,
        }
    }
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var(constants::config::LOG_LEVEL_ENV)
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;

    std::panic::set_hook(Box::new(|panic| {
        error!(panic = %panic, "Panic");
    }));
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let socket = match cli.socket {
        Some(path) => path,
        None => ipc::default_socket_path()?,
    };

    let command = cli.command.unwrap_or(Commands::Run {
        debounce_ms: persistence::DEBOUNCE_MS,
        viewport: ViewportArgs {
            viewport_width: ring::DEFAULT_VIEWPORT_WIDTH,
            viewport_height: ring::DEFAULT_VIEWPORT_HEIGHT,
        },
    });

    match command {
        Commands::Run {
            debounce_ms,
            viewport,
        } => {
            info!(version = env!("CARGO_PKG_VERSION"), "Starting lum-o-ring");
            daemon::run_daemon(DaemonOptions {
                settings_path: cli.settings.unwrap_or_else(SettingsStore::default_path),
                socket_path: socket,
                debounce: Duration::from_millis(debounce_ms),
                viewport: viewport.into(),
            })
        }

        Commands::Get => client::get(client::connect(&socket)?, &mut std::io::stdout()),

        Commands::Set(args) => {
            client::set(client::connect(&socket)?, args.into(), &mut std::io::stdout())?;
            Ok(())
        }

        Commands::Toggle => {
            let on = client::toggle(client::connect(&socket)?)?;
            println!("Ring {}", if on { "on" } else { "off" });
            Ok(())
        }

        Commands::Menu { activate } => {
            client::menu(client::connect(&socket)?, activate, &mut std::io::stdout())
        }

        Commands::OpenSettings => client::open_settings(client::connect(&socket)?),

        Commands::CloseSettings => client::close_settings(client::connect(&socket)?),

        Commands::Quit => client::quit(client::connect(&socket)?),

        Commands::Watch { viewport, json } => {
            let renders = client::watch(client::connect(&socket)?, viewport.into(), move |style| {
                match client::format_style(style, json) {
                    Ok(line) => println!("{line}"),
                    Err(e) => error!(error = ?e, "Failed to format ring style"),
                }
            })?;
            info!(renders, "Watch finished");
            Ok(())
        }
    }
}
