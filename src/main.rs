use watchpost::{
    camera::{self, FrameSource},
    common::AuthBackend,
    core::{EventLog, FrameProducer, FrameStore, ShutdownFlag},
    identity,
    web::{AuthGate, PageHandler, Router, WebServer},
    Config, DevMode, UserStore,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "watchpost")]
#[command(about = "Password-protected MJPEG live stream from a V4L2 camera")]
struct Cli {
    /// Enable development mode (test pattern source, data kept under ./dev_data)
    #[arg(long, global = true)]
    dev: bool,

    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture frames and serve the web interface until Ctrl-C
    Serve,
    /// Add a web user or replace their password
    AddUser {
        #[arg(short, long)]
        username: String,
        /// Password; read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Remove a web user
    RemoveUser {
        #[arg(short, long)]
        username: String,
    },
    /// List web users
    ListUsers,
    /// List V4L2 capture devices
    ListCameras,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    dev_mode.apply(&mut config);

    match cli.command {
        Commands::Serve => serve(config, &dev_mode)?,
        Commands::AddUser { username, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password_line()?,
            };
            let mut store = open_users(&config)?;
            let replaced = store.set_user(&username, &password)?;
            store.save()?;
            if replaced {
                println!("Updated password for {}", username);
            } else {
                println!("Added user {}", username);
            }
        }
        Commands::RemoveUser { username } => {
            let mut store = open_users(&config)?;
            store.remove_user(&username)?;
            store.save()?;
            println!("Removed user {}", username);
        }
        Commands::ListUsers => {
            let store = open_users(&config)?;
            if store.is_empty() {
                println!("No users in {}", store.path().display());
            }
            for name in store.usernames() {
                println!("{}", name);
            }
        }
        Commands::ListCameras => {
            let cameras = camera::Camera::list_all_cameras()?;
            if cameras.is_empty() {
                println!("No cameras found. Check /dev/video* permissions.");
                return Ok(());
            }
            for info in &cameras {
                let marker = if info.can_capture { "capture" } else { "no capture" };
                println!("/dev/video{}: {} ({})", info.index, info.card, marker);
                for format in &info.formats {
                    println!("   - {}", format);
                }
            }
            println!("\nSet [camera] device_index in the config, or 999 to auto-detect.");
        }
    }

    Ok(())
}

fn serve(config: Config, dev_mode: &DevMode) -> Result<()> {
    tracing::info!("Starting watchpost (dev_mode: {})", dev_mode.is_enabled());

    let shutdown = ShutdownFlag::new();
    shutdown.install_signal_handler()?;

    let source: Box<dyn FrameSource> = if dev_mode.is_enabled() {
        tracing::info!("Dev mode: streaming a generated test pattern");
        Box::new(camera::TestPattern::new(
            config.camera.width,
            config.camera.height,
            config.camera.fps,
        ))
    } else {
        Box::new(camera::Camera::new(&config.camera).context("Failed to open camera")?)
    };

    let store = FrameStore::new();
    let events = EventLog::new(config.events.log_path.clone(), config.events.every_n_frames);
    let producer = FrameProducer::new(source, store.clone(), config.camera.jpeg_quality)
        .with_event_log(events);
    let producer_handle = producer
        .spawn(shutdown.clone())
        .context("Failed to start capture thread")?;

    let authenticator = identity::from_config(&config.auth).context("Failed to set up authentication")?;
    let router = Router::new(
        AuthGate::new(authenticator),
        store,
        shutdown.clone(),
        PageHandler::new(config.events.log_path.clone()),
        config.server.clone(),
    );

    // the capture loop keeps running even if the port is taken
    let web_handle = match WebServer::bind(&config.server, router, shutdown.clone()) {
        Ok(server) => Some(server.spawn().context("Failed to start web thread")?),
        Err(e) => {
            tracing::error!("Web interface disabled: {}", e);
            None
        }
    };

    while !shutdown.is_triggered() {
        thread::sleep(Duration::from_millis(200));
    }
    tracing::info!("Shutting down");

    if let Some(handle) = web_handle {
        if handle.join().is_err() {
            tracing::warn!("Web thread panicked");
        }
    }
    if producer_handle.join().is_err() {
        tracing::warn!("Capture thread panicked");
    }
    Ok(())
}

fn open_users(config: &Config) -> Result<UserStore> {
    if config.auth.backend == AuthBackend::Pam {
        tracing::warn!("Auth backend is PAM; the user file is not consulted while serving");
    }
    UserStore::open(&config.auth.users_file)
        .with_context(|| format!("Failed to open {}", config.auth.users_file.display()))
}

fn read_password_line() -> Result<String> {
    eprintln!("Password:");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Empty password");
    }
    Ok(password)
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    }
}
