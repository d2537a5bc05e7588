//! Fleet Chat Relay - forward fleet chat log lines to a Discord webhook.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fleet_chat_relay::config::{AppConfig, ClassifierMode, ConfigLoader, ConfigOverrides};
use fleet_chat_relay::display;
use fleet_chat_relay::presence::{
    identity_from_input, IdentitySource, LogDirectoryIdentities, StaticIdentities,
};
use fleet_chat_relay::relay::{ConsoleSink, RelaySink, WebhookSink};
use fleet_chat_relay::session::{SessionController, SessionPhase, SessionStatus};
use fleet_chat_relay::watcher::LogResolver;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Relay,
    Count,
}

impl From<ModeArg> for ClassifierMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Relay => ClassifierMode::Relay,
            ModeArg::Count => ClassifierMode::Count,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Parser)]
#[command(
    name = "fleet-chat-relay",
    about = "Relay fleet chat log lines to a Discord webhook",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use this config file instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail a character's fleet log and relay new lines.
    Run {
        /// Character to start with. Use `load <name>` on stdin otherwise.
        identity: Option<String>,
        /// Relay lines or count x-replies.
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
        /// Chat log directory.
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Do not prefix messages with a relative timestamp.
        #[arg(long)]
        no_timestamps: bool,
        /// Print messages instead of posting them.
        #[arg(long)]
        dry_run: bool,
    },
    /// List characters found in the chat log directory.
    Identities {
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Read characters from these client window titles instead.
        #[arg(long = "window", value_name = "TITLE")]
        windows: Vec<String>,
    },
    /// Show which log file a character resolves to.
    Resolve {
        identity: String,
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Inspect or edit the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config search paths.
    Path,
    /// Set the webhook endpoint.
    SetWebhook { url: String },
    /// Turn relative timestamps on or off.
    Timestamps {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Set the default mode.
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn config_loader(path: Option<PathBuf>) -> ConfigLoader {
    path.map_or_else(ConfigLoader::new, ConfigLoader::with_path)
}

fn log_dir_or_default(log_dir: Option<PathBuf>, config: &AppConfig) -> Option<PathBuf> {
    log_dir.or_else(|| config.resolved_log_dir())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let loader = config_loader(cli.config);

    match cli.command {
        Commands::Run {
            identity,
            mode,
            log_dir,
            no_timestamps,
            dry_run,
        } => {
            let overrides = ConfigOverrides {
                mode: mode.map(Into::into),
                log_dir,
                include_timestamps: no_timestamps.then_some(false),
            };
            run(loader, overrides, identity, dry_run).await
        }
        Commands::Identities { log_dir, windows } => {
            let source: Box<dyn IdentitySource> = if windows.is_empty() {
                let config = loader.load_or_default();
                let Some(dir) = log_dir_or_default(log_dir, &config) else {
                    display::print_error("Could not determine the chat log directory");
                    return ExitCode::FAILURE;
                };
                Box::new(LogDirectoryIdentities::new(dir, config.log_prefix.clone()))
            } else {
                Box::new(StaticIdentities::from_window_titles(&windows))
            };
            match source.identities().await {
                Ok(names) if names.is_empty() => {
                    display::print_notice("No characters found");
                    ExitCode::SUCCESS
                }
                Ok(names) => {
                    for name in names {
                        println!("{name}");
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    display::print_error(&e.to_string());
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Resolve { identity, log_dir } => {
            let config = loader.load_or_default();
            let Some(dir) = log_dir_or_default(log_dir, &config) else {
                display::print_error("Could not determine the chat log directory");
                return ExitCode::FAILURE;
            };
            let resolver = LogResolver::new(dir, config.log_prefix.clone());
            match resolver.resolve(&identity) {
                Ok(source) => {
                    println!("{}", source.path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    display::print_error(&e.to_string());
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Config { action } => config_command(&loader, action),
    }
}

fn config_command(loader: &ConfigLoader, action: ConfigAction) -> ExitCode {
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    match action {
        ConfigAction::Show => {
            return match toml::to_string_pretty(&config) {
                Ok(text) => {
                    print!("{text}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    display::print_error(&e.to_string());
                    ExitCode::FAILURE
                }
            };
        }
        ConfigAction::Path => {
            let found = loader.find_config_file();
            for path in loader.search_paths() {
                let marker = if found.as_ref() == Some(path) { "*" } else { " " };
                println!("{marker} {}", path.display());
            }
            return ExitCode::SUCCESS;
        }
        ConfigAction::SetWebhook { url } => {
            config.webhook_endpoint = url.trim().to_string();
            if let Err(e) = config.relay_config().endpoint_url() {
                display::print_error(&e.to_string());
                return ExitCode::FAILURE;
            }
        }
        ConfigAction::Timestamps { state } => {
            config.include_timestamps = matches!(state, Toggle::On);
        }
        ConfigAction::Mode { mode } => config.mode = mode.into(),
    }

    match loader.save(&config) {
        Ok(path) => {
            display::print_notice(&format!("Saved {}", path.display()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(
    loader: ConfigLoader,
    overrides: ConfigOverrides,
    identity: Option<String>,
    dry_run: bool,
) -> ExitCode {
    let config = loader.load_or_default();

    let sink: Arc<dyn RelaySink> = if dry_run {
        Arc::new(ConsoleSink)
    } else {
        match WebhookSink::new(config.request_timeout()) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                display::print_error(&e.to_string());
                return ExitCode::FAILURE;
            }
        }
    };

    let mut controller = SessionController::new(config, sink)
        .with_config_loader(loader)
        .with_overrides(overrides);
    if dry_run {
        controller = controller.without_endpoint_check();
    }

    let status_printer = tokio::spawn(print_status_changes(controller.status()));
    // The mode can change between sessions, so always watch the counter.
    let counter_printer = tokio::spawn(print_counter_changes(controller.counter()));

    if let Some(identity) = identity {
        load(&mut controller, &identity).await;
    } else {
        display::print_notice("Type `load <character>` to start relaying");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    break;
                }
            },
        };

        let line = line.trim();
        let (command, argument) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" => {}
            "load" => load(&mut controller, argument).await,
            "stop" => controller.stop().await,
            "reset" => controller.reset_counter().await,
            "status" => {
                let counter = *controller.counter().borrow();
                display::print_status_report(&controller.current_status(), counter);
            }
            "quit" | "exit" => break,
            other => display::print_error(&format!(
                "Unknown command '{other}' (load <character>, stop, reset, status, quit)"
            )),
        }
    }

    controller.shutdown().await;
    status_printer.abort();
    counter_printer.abort();
    ExitCode::SUCCESS
}

async fn load(controller: &mut SessionController, input: &str) {
    match controller.load(&identity_from_input(input)).await {
        Ok(source) => display::print_session_start(&source.listener_name, &source.file_name()),
        Err(e) => display::print_error(&e.to_string()),
    }
}

async fn print_status_changes(mut rx: watch::Receiver<SessionStatus>) {
    let mut last_phase = SessionPhase::Idle;
    while rx.changed().await.is_ok() {
        let status = rx.borrow_and_update().clone();
        if status.phase != last_phase {
            last_phase = status.phase;
            display::print_status(&status);
            if status.phase == SessionPhase::Stopped {
                if let Some(error) = &status.last_error {
                    display::print_error(error);
                }
            }
        }
    }
}

async fn print_counter_changes(mut rx: watch::Receiver<u64>) {
    let mut last = *rx.borrow_and_update();
    while rx.changed().await.is_ok() {
        let total = *rx.borrow_and_update();
        if total != last {
            last = total;
            display::print_counter(total);
        }
    }
}
