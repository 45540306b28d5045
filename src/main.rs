//! wsl-oobe - Main entry point
//!
//! Runs once on the first launch of the distribution. Exit status is the
//! only machine-readable output; see `wsl_oobe::exit_code`.

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wsl_oobe::cli::{Cli, Commands};
use wsl_oobe::{
    ConsoleTerminal, HostAccountStore, HostExecutor, HostProbe, Oobe, OobeConfig, OobeError,
    OpensslHasher, Outcome, PasswdqcChecker, RunMode, Seams, TcpProbe, exit_code,
};

/// Initialize the logger: stderr, `RUST_LOG` filter, `warn` by default.
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report_error(err: &OobeError) {
    error!(error = %err, code = err.exit_code(), "setup failed");
    eprintln!();
    eprintln!("Error: {err}");
    if err.rolled_back() {
        eprintln!("The new account was removed again; nothing was left half-configured.");
    }
    if err.is_bug() {
        eprintln!("This looks like a problem with the distribution image. Please report it.");
    } else {
        eprintln!("Run the distribution again to restart setup.");
    }
}

fn run(cli: &Cli) -> i32 {
    let config = match OobeConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report_error(&OobeError::config(format!("{e:#}")));
            return exit_code::FAILURE;
        }
    };

    let mode = RunMode::detect(cli.dry_run);
    info!(?mode, "wsl-oobe starting");

    let exec = HostExecutor::new(mode);
    let accounts = HostAccountStore::new(&exec);
    let hasher = OpensslHasher::new(&exec);
    let env = HostProbe;
    let checker = PasswdqcChecker::detect(&exec, &env, &config);
    let network = TcpProbe::new(config.probe_hosts.clone(), config.probe_timeout());
    let seams = Seams {
        exec: &exec,
        accounts: &accounts,
        hasher: &hasher,
        checker: &checker,
        env: &env,
        network: &network,
    };
    let mut terminal = ConsoleTerminal;
    let mut oobe = Oobe::new(&config, seams, &mut terminal).skip_bootstrap(cli.skip_bootstrap);

    match cli.action() {
        Commands::Check => {
            let caps = oobe.check();
            print!("{caps}");
            match caps.verdict() {
                Ok(()) => {
                    println!("\nAll checks passed.");
                    exit_code::SUCCESS
                }
                Err(e) => {
                    eprintln!("\nError: {e}");
                    e.exit_code()
                }
            }
        }
        Commands::Run => match oobe.run() {
            Ok(Outcome::AlreadyProvisioned) => exit_code::SUCCESS,
            Ok(Outcome::Provisioned { bootstrap, .. }) => {
                if bootstrap.as_ref().is_some_and(|r| r.has_warnings()) {
                    warn!("setup finished with bootstrap warnings");
                }
                exit_code::SUCCESS
            }
            Err(e) => {
                report_error(&e);
                e.exit_code()
            }
        },
    }
}

fn main() {
    init_logger();
    let cli = Cli::parse();

    // Terminate spawned tools (and their process groups) on SIGINT/SIGTERM/SIGHUP
    if let Err(e) = wsl_oobe::process_guard::install_signal_handlers() {
        warn!(error = %e, "failed to install signal handlers");
    }

    // Everything holding secrets is dropped inside run() before exiting
    let code = run(&cli);
    std::process::exit(code);
}
