use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "git-ssh-signing")]
#[command(about = "Configure git to sign with an SSH key, and undo it afterwards", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install the signing key and configure git
    Setup(SetupArgs),
    /// Remove the key and restore the git configuration saved by `setup`
    Cleanup,
    /// Print type, size, fingerprint, and comment of a key file
    KeyInfo {
        /// Path to a private or public key
        path: PathBuf,
    },
}

// Inputs are taken as raw strings and validated by `Context` so that bad
// values are reported the same way whether they come from flags or the
// runtime's INPUT_* variables.
#[derive(Args, Debug, Default)]
pub struct SetupArgs {
    /// Private key text (OpenSSH format)
    #[arg(long, env = "INPUT_SSH-SIGNING-KEY", hide_env_values = true)]
    pub ssh_signing_key: Option<String>,

    #[arg(long, env = "INPUT_GIT-USER-NAME")]
    pub git_user_name: Option<String>,

    #[arg(long, env = "INPUT_GIT-USER-EMAIL")]
    pub git_user_email: Option<String>,

    /// Where to install the private key
    #[arg(long, env = "INPUT_SSH-KEY-PATH")]
    pub ssh_key_path: Option<String>,

    #[arg(long, env = "INPUT_GIT-COMMIT-GPGSIGN", value_name = "BOOL")]
    pub git_commit_gpgsign: Option<String>,

    #[arg(long, env = "INPUT_GIT-TAG-GPGSIGN", value_name = "BOOL")]
    pub git_tag_gpgsign: Option<String>,

    /// if-asked, true, or false
    #[arg(long, env = "INPUT_GIT-PUSH-GPGSIGN")]
    pub git_push_gpgsign: Option<String>,

    #[arg(long, env = "INPUT_CREATE-ALLOWED-SIGNERS", value_name = "BOOL")]
    pub create_allowed_signers: Option<String>,

    /// local or global
    #[arg(long, env = "INPUT_GIT-CONFIG-SCOPE")]
    pub git_config_scope: Option<String>,
}
