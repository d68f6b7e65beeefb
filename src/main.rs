// tunectl - terminal music library manager, playback side
// Supervises an external media player and takes commands from the keyboard,
// a command file and other tunectl invocations

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};
use tunectl::{
    app::{App, Keymap},
    player::{Player, PlayerController, PlayerError},
    remote::{self, Startup},
    runtime::{signals, EventLoop, LoopError, FLAGS},
    ui::{Display, NullDisplay},
    Config, Library,
};

#[derive(Parser)]
#[command(name = "tunectl")]
#[command(about = "Terminal music player driving an external media player")]
struct Args {
    /// Media player executable (overrides the config file)
    #[arg(short = 'm', long = "player")]
    player: Option<PathBuf>,

    /// Send a command to the running instance and exit with its status
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,

    /// Config file to use instead of the default one
    #[arg(short = 'f', long = "config")]
    config: Option<PathBuf>,

    /// Command file replayed at startup
    #[arg(short = 'r', long = "rc")]
    rc: Option<PathBuf>,

    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,

    /// Music directories or files (overrides the configured library)
    paths: Vec<PathBuf>,
}

fn init_logging(log_dir: &std::path::Path, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).with_context(|| format!("creating log directory {}", log_dir.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(log_dir, "tunectl.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let base_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tunectl=debug"));

    // The terminal belongs to the UI; stderr only gets a copy in dev mode
    let stderr_layer = dev.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(base_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false),
        )
        .with(stderr_layer)
        .try_init()?;

    if dev {
        eprintln!("🔧 Dev mode: debug output to stderr + file");
    }
    Ok(guard)
}

fn stdout_is_terminal() -> bool {
    // SAFETY: isatty only inspects the descriptor
    unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 }
}

#[cfg(feature = "tui")]
fn open_display() -> Result<(Box<dyn Display>, Option<tunectl::ui::TerminalManager>)> {
    if stdout_is_terminal() {
        let terminal = tunectl::ui::TerminalManager::new()?;
        Ok((Box::new(tunectl::ui::StatusLine::new()), Some(terminal)))
    } else {
        Ok((Box::new(NullDisplay), None))
    }
}

#[cfg(not(feature = "tui"))]
fn open_display() -> Result<(Box<dyn Display>, Option<()>)> {
    debug!("Built without terminal support (stdout is a tty: {})", stdout_is_terminal());
    Ok((Box::new(NullDisplay), None))
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(player) = &args.player {
        config.player.program = player.clone();
    }

    let _log_guard = init_logging(&config.paths.log_dir, args.dev)?;
    info!("🎵 tunectl starting up");

    let socket = match remote::startup(&config.paths.socket, &args.commands)? {
        Startup::Forwarded(status) => return Ok(ExitCode::from(remote::exit_status(status))),
        Startup::AlreadyRunning => {
            println!("tunectl appears to be running already; not opening another one.");
            return Ok(ExitCode::SUCCESS);
        }
        Startup::Start(socket) => socket,
    };

    let music_paths = if args.paths.is_empty() {
        config.music_directories.clone()
    } else {
        args.paths.clone()
    };
    let library = Library::scan(&music_paths)?;
    if library.track_count() == 0 {
        println!("No music found in {:?}.", music_paths);
        println!("Pass directories on the command line or set music_directories in {:?}.", Config::config_path()?);
        return Ok(ExitCode::SUCCESS);
    }
    info!("📀 {} tracks in library", library.track_count());

    signals::install().context("installing signal handlers")?;

    let controller = PlayerController::new(
        config.player.program.clone(),
        config.player.args.clone(),
        config.kill_grace(),
    );
    let mut player = Player::new(Box::new(controller), config.player_options());
    player.start()?;

    let (display, terminal) = open_display()?;
    let mut app = App::new(player, library, display, &FLAGS);

    let rc = args.rc.clone().unwrap_or_else(|| config.paths.command_file.clone());
    if let Err(e) = app.replay_file(&rc) {
        let _ = app.player.kill();
        drop(terminal);
        return Err(e);
    }

    signals::start_timer(config.tick()).context("starting monitor timer")?;

    let mut event_loop = EventLoop::new(app, Keymap::default())
        .with_socket(socket)
        .with_input_file(config.paths.input_file.clone());
    let result = event_loop.run();

    // Teardown: backend, socket, terminal
    if let Err(e) = signals::stop_timer() {
        debug!("Stopping timer: {}", e);
    }
    if let Err(e) = event_loop.app.player.kill() {
        error!("Media player shutdown: {}", e);
    }
    drop(event_loop.take_socket());
    drop(terminal);

    match result {
        Ok(()) => {
            info!("👋 tunectl exiting");
            Ok(ExitCode::SUCCESS)
        }
        Err(LoopError::Player(PlayerError::BackendMisbehaving { failures })) => {
            error!("Giving up after {} backend failures", failures);
            eprintln!("the media player appears to be misbehaving");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
