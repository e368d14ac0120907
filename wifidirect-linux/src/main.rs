// Wi-Fi Direct session daemon for Linux: LAN transport plus an interactive console.

mod cli;
mod config;
mod discovery;
mod link;
mod transport;

use std::io::BufRead;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wifidirect_core::{
    ConnectionStatus, DiscoveryStatus, Passphrase, SessionError, SessionPhase, WifiDirect,
};

use crate::cli::Command;
use crate::transport::LanTransport;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

enum Input {
    Line(String),
    Shutdown,
}

/// Console state that is not part of the session.
#[derive(Default)]
struct Console {
    /// Passphrase shown while hosting.
    hosting_passphrase: Option<String>,
    /// Address picked by `connect <address>`, waiting for a passphrase line.
    selected: Option<String>,
}

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("wifidirect-linux {}", VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                println!("wifidirect-linux {}\n\n{}", VERSION, cli::HELP);
                return Ok(());
            }
            other => anyhow::bail!("unknown argument `{other}` (try --help)"),
        }
    }

    // Logs go to stderr; stdout is the console.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load();
    info!(
        discovery_port = cfg.discovery_port,
        link_port = cfg.link_port,
        service = %cfg.session.service_name,
        "wifidirect-linux {} starting",
        VERSION
    );

    let mut wd = WifiDirect::try_new(cfg.session.clone(), |sink| LanTransport::new(&cfg, sink))
        .context("starting LAN transport")?;
    register_printers(&mut wd);

    let (input_tx, input_rx) = mpsc::channel();
    spawn_stdin_reader(input_tx.clone());
    let signal_tx = input_tx;
    wd.transport().spawn(async move {
        if shutdown_signal().await.is_ok() {
            let _ = signal_tx.send(Input::Shutdown);
        }
    });

    let me = wd.transport().local_device();
    println!("device {} ({})", me.address, me.display_name);
    println!("{}", cli::TEXT_DEFAULT);
    let mut console = Console::default();
    loop {
        wd.pump_timeout(PUMP_INTERVAL);
        match input_rx.try_recv() {
            Ok(Input::Line(line)) => {
                if !handle_line(&mut wd, &mut console, &line) {
                    break;
                }
            }
            Ok(Input::Shutdown) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }
    }

    wd.close();
    wd.pump();
    info!("bye");
    Ok(())
}

/// Returns false when the console should exit.
fn handle_line(wd: &mut WifiDirect<LanTransport>, console: &mut Console, line: &str) -> bool {
    if let Some(address) = console.selected.take() {
        let passphrase = line.trim();
        if !passphrase.is_empty() {
            report(wd.connect(&address, passphrase));
            return true;
        }
    }
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(cli::ParseError::Empty) => return true,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };
    debug!(?command, "console command");
    match command {
        Command::Host(passphrase) => {
            let passphrase = passphrase.unwrap_or_else(|| Passphrase::generate().as_str().to_string());
            if report(wd.create_discoverable_server(&passphrase)) {
                println!("{}", cli::instruction(SessionPhase::Hosting, Some(&passphrase)));
                console.hosting_passphrase = Some(passphrase);
            }
        }
        Command::Join => {
            if report(wd.discover_services()) {
                println!("{}", cli::TEXT_DISCOVERING);
            }
        }
        Command::Peers => {
            if report(wd.discover_peers()) {
                println!("{}", cli::TEXT_DISCOVERING);
            }
        }
        Command::List => print_devices(wd),
        Command::Connect {
            address,
            passphrase: Some(passphrase),
        } => {
            report(wd.connect(&address, &passphrase));
        }
        Command::Connect {
            address,
            passphrase: None,
        } => {
            println!("{}", cli::TEXT_SELECTED);
            console.selected = Some(address);
        }
        Command::Cancel => match wd.phase() {
            SessionPhase::Connecting => {
                report(wd.cancel_connect());
            }
            _ => {
                report(wd.cancel_discovery());
            }
        },
        Command::Send(text) => {
            report(wd.send(text.as_bytes()));
        }
        Command::Remove => {
            report(wd.remove_service());
        }
        Command::Disconnect => {
            report(wd.disconnect());
        }
        Command::Status => {
            let session = wd.session();
            println!(
                "phase {:?}, role {:?}, discovered {}, peer {}",
                session.phase(),
                session.role(),
                session.discovered().len(),
                session
                    .connected_peer()
                    .map(|d| format!("{} ({})", d.display_name, d.address))
                    .unwrap_or_else(|| "none".to_string()),
            );
            let hosting = console.hosting_passphrase.as_deref().filter(|_| session.is_hosting());
            println!("{}", cli::instruction(session.phase(), hosting));
        }
        Command::Help => println!("{}", cli::HELP),
        Command::Quit => return false,
    }
    if wd.phase() == SessionPhase::Idle {
        console.hosting_passphrase = None;
    }
    true
}

/// Print a rejected command. Returns true when the command was accepted.
fn report(result: Result<(), SessionError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            println!("error: {e}");
            false
        }
    }
}

fn print_devices(wd: &WifiDirect<LanTransport>) {
    if wd.discovered().is_empty() {
        println!("no devices found");
        return;
    }
    for device in wd.discovered().iter() {
        println!("  {}  {}", device.address, device.display_name);
    }
}

fn register_printers(wd: &mut WifiDirect<LanTransport>) {
    let listeners = wd.listeners();
    listeners.on_radio(|status| println!("[radio] {:?}", status));
    listeners.on_discovery(|event| match event.status {
        DiscoveryStatus::ServiceListChanged => {
            println!("[discovery] {} device(s):", event.devices.len());
            for device in &event.devices {
                println!("  {}  {}", device.address, device.display_name);
            }
        }
        status => println!("[discovery] {:?}", status),
    });
    listeners.on_connection(|status| {
        println!("[connection] {:?}", status);
        if matches!(
            status,
            ConnectionStatus::Disconnected | ConnectionStatus::ConnectionLost
        ) {
            println!("{}", cli::TEXT_DEFAULT);
        }
    });
    listeners.on_error(|event| match event.platform_reason {
        Some(reason) => println!("[error] {:?} ({})", event.reason, reason),
        None => println!("[error] {:?}", event.reason),
    });
    listeners.on_message(|payload| println!("[message] {}", String::from_utf8_lossy(payload)));
}

fn spawn_stdin_reader(tx: mpsc::Sender<Input>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Input::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Input::Shutdown);
    });
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
