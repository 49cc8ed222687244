mod cleanup;
mod cli;
mod config;
mod config_keys;
mod context;
mod error;
mod git;
mod host;
mod logging;
mod platform;
mod setup;
mod side_effects;
mod ssh;
mod state;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{error, info, warn};

use cleanup::Cleanup;
use cli::{Cli, Command, SetupArgs};
use config::SigningConfig;
use context::Context;
use git::GitConfig;
use host::Host;
use platform::{Permissions, Platform};
use setup::Setup;
use side_effects::NpmTagSigning;
use ssh::{KeyManager, OpenSsh};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut host = Host::from_env();
    logging::init(host.is_actions());

    match cli.command {
        Command::Setup(args) => {
            if let Err(e) = run_setup(&mut host, &args) {
                error!("Setup failed: {e:#}");
                std::process::exit(1);
            }
        }
        Command::Cleanup => run_cleanup(&host),
        Command::KeyInfo { path } => {
            let config = config::load_config()?;
            let info = key_manager(&config)
                .get_info(&path)
                .with_context(|| format!("Failed to read key {}", path.display()))?;
            match &info.comment {
                Some(comment) => println!("{info} ({comment})"),
                None => println!("{info}"),
            }
        }
    }

    Ok(())
}

fn run_setup(host: &mut Host, args: &SetupArgs) -> Result<()> {
    let config = config::load_config()?;
    let _group = host.group("🔐 Setting up SSH signing");

    let ctx = Context::from_args(args, &config.default_key_path)?;
    let git = GitConfig::new(&config.tools.git);
    let keys = key_manager(&config);
    let npm = NpmTagSigning::new(&config.tools.npm, config.side_effects.npm_sign_git_tag);
    let mut state = state::open_store(config.state.backend, host, &config.state_file()?)?;

    Setup {
        config: &git,
        keys: &keys,
        state: state.as_mut(),
        npm: &npm,
    }
    .run(&ctx, host)?;

    info!("✅ SSH signing configuration complete");
    Ok(())
}

// Cleanup must never fail the run, so configuration problems only narrow
// what can be cleaned up.
fn run_cleanup(host: &Host) {
    let _group = host.group("🧹 Cleaning up SSH signing configuration");

    let config = config::load_config().unwrap_or_else(|e| {
        warn!("Using default configuration: {e:#}");
        SigningConfig::default()
    });
    let state_file = match config.state_file() {
        Ok(path) => path,
        Err(e) => {
            warn!("Cleanup encountered errors: {e:#}");
            return;
        }
    };
    let mut state = match state::open_store(config.state.backend, host, &state_file) {
        Ok(state) => state,
        Err(e) => {
            warn!("Cleanup encountered errors: {e}");
            return;
        }
    };

    let git = GitConfig::new(&config.tools.git);
    let keys = key_manager(&config);
    let npm = NpmTagSigning::new(&config.tools.npm, config.side_effects.npm_sign_git_tag);

    Cleanup {
        config: &git,
        keys: &keys,
        state: state.as_mut(),
        npm: &npm,
    }
    .run();
}

fn key_manager(config: &SigningConfig) -> KeyManager {
    let platform = Platform::current();
    KeyManager::new(
        Box::new(OpenSsh::new(&config.tools.ssh_keygen, &config.tools.ssh_add)),
        Permissions::for_platform(platform, &config.tools.icacls),
        platform,
    )
}
