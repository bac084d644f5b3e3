use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use strata_wm::actor::reactor::Reactor;
use strata_wm::common::config::{Config, config_file};
use strata_wm::common::log;
use strata_wm::model::Session;
use strata_wm::sys::process::{ProcessLauncher, ignore_child_exits};
use strata_wm::sys::x11::X11Display;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(version, about = "A tiling window manager for X11")]
struct Cli {
    /// Configuration file. Defaults to ~/.config/strata/strata.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Check the configuration and exit without connecting to the display.
    #[arg(long)]
    check_config: bool,

    /// Put windows back where the last saved session had them.
    #[arg(long)]
    restore: bool,

    /// X display to manage instead of $DISPLAY.
    #[arg(long)]
    display: Option<String>,
}

fn main() -> ExitCode {
    let opt: Cli = Parser::parse();

    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: We are single threaded at this point.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    log::init_logging();
    install_panic_hook();

    match run(opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(opt: Cli) -> anyhow::Result<()> {
    let path = opt.config.unwrap_or_else(config_file);
    let config = if path.exists() {
        Config::load(&path)?
    } else {
        info!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };
    if opt.check_config {
        println!("{} is valid", path.display());
        return Ok(());
    }

    let session = if opt.restore {
        let session_path = config.settings.session_path();
        match Session::load(&session_path) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %session_path.display(), "could not load session: {err:#}");
                None
            }
        }
    } else {
        None
    };

    if let Err(err) = ignore_child_exits() {
        warn!(%err, "children will not be reaped automatically");
    }

    let display = X11Display::connect(opt.display.as_deref()).context("could not connect to the X server")?;
    let reactor = Reactor::new(config, Box::new(display), Box::new(ProcessLauncher), session)?;
    reactor.run()?;
    info!("bye");
    Ok(())
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // Abort on panic instead of unwinding past the event loop.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
