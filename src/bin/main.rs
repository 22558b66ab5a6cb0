use std::{
    io,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use localrun_agent::{
    cli::{Cli, Commands, parse_args},
    constants::{DEFAULT_PORT, GREEN_BOLD, RED_BOLD, RESET, YELLOW_BOLD},
    controller::{Controller, StepOutcome, Transition, UninstallStep},
    error::AgentError,
    launchctl::Launchctl,
    logs::LogViewer,
    runtime::AgentPaths,
    server::{self, ServerConfig},
    status::StatusReporter,
};

fn main() -> ExitCode {
    let args = parse_args();
    init_logging(&args);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!("command failed: {err:?}");
            eprintln!("{RED_BOLD}✗{RESET} {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Cli) {
    let level = match &args.command {
        Commands::Serve { log_level, .. } => log_level.as_str(),
        _ => "warn",
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(io::stderr)
        .try_init();
}

fn run(args: Cli) -> Result<(), AgentError> {
    let paths = AgentPaths::user()?;

    match args.command {
        Commands::Serve { port, host, .. } => serve(ServerConfig {
            host,
            port,
            config_file: paths.config_file.clone(),
        }),
        Commands::Install => {
            let controller = Controller::new(paths, Launchctl::default());
            controller.install()?;
            println!(
                "{GREEN_BOLD}✓{RESET} Launch agent installed at {}",
                controller.paths().descriptor_file.display()
            );
            println!("\nTo start the service:\n  localrun-agent start");
            Ok(())
        }
        Commands::Uninstall => {
            let controller = Controller::new(paths, Launchctl::default());
            let report = controller.uninstall();
            for (step, outcome) in &report.steps {
                if *outcome != StepOutcome::Performed {
                    continue;
                }
                let message = match step {
                    UninstallStep::Unregister => "Launch agent unloaded",
                    UninstallStep::RemoveDescriptor => "Launch agent removed",
                    UninstallStep::RemoveConfigRecord => "Configuration removed",
                };
                println!("{GREEN_BOLD}✓{RESET} {message}");
            }
            println!("\nLocalRun Agent uninstalled");
            Ok(())
        }
        Commands::Start => {
            let controller = Controller::new(paths, Launchctl::default());
            report_start(controller.start()?);
            Ok(())
        }
        Commands::Stop => {
            let controller = Controller::new(paths, Launchctl::default());
            report_stop(controller.stop()?);
            Ok(())
        }
        Commands::Restart => {
            let controller = Controller::new(paths, Launchctl::default());
            println!("Restarting service...");
            let outcome = controller.restart()?;
            report_stop(outcome.stopped);
            report_start(outcome.started);
            Ok(())
        }
        Commands::Status { json, no_color } => {
            let reporter = StatusReporter::new(paths, Launchctl::default());
            let report = reporter.report()?;
            if json {
                let rendered = serde_json::to_string_pretty(&report)
                    .map_err(|err| AgentError::Io(io::Error::other(err)))?;
                println!("{rendered}");
            } else {
                println!("{}", report.render(!no_color));
            }
            Ok(())
        }
        Commands::Logs { follow, lines } => {
            let viewer = LogViewer::new(paths.log_file);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            if follow {
                let stop = Arc::new(AtomicBool::new(false));
                let flag = Arc::clone(&stop);
                if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
                    error!("failed to install Ctrl-C handler: {err}");
                }
                viewer.follow(lines, &mut out, &stop)?;
                println!();
            } else {
                viewer.tail(lines, &mut out)?;
            }
            Ok(())
        }
    }
}

fn serve(config: ServerConfig) -> Result<(), AgentError> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::run(config))
}

fn report_start(transition: Transition) {
    match transition {
        Transition::Applied => {
            println!("{GREEN_BOLD}✓{RESET} LocalRun Agent started");
            println!("\nService running at http://localhost:{DEFAULT_PORT}");
            println!("View logs: localrun-agent logs");
        }
        Transition::AlreadyInState => {
            println!("{YELLOW_BOLD}!{RESET} Service is already running")
        }
    }
}

fn report_stop(transition: Transition) {
    match transition {
        Transition::Applied => println!("{GREEN_BOLD}✓{RESET} LocalRun Agent stopped"),
        Transition::AlreadyInState => {
            println!("{YELLOW_BOLD}!{RESET} Service is already stopped")
        }
    }
}
