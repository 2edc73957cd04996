use crate::keychain::PassphraseMode;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "keychain-p12")]
#[command(version = "1.0.0")]
#[command(about = "Find keychain identities and export them as PKCS#12")]
#[command(long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, env = "KEYCHAIN_P12_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output raw tab-separated values (no formatting)
    #[arg(short, long)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List identities whose label matches
    List {
        /// Label to match (substring unless --full-match); empty matches everything
        #[arg(long, short = 'l')]
        label: Option<String>,
        /// Require the label to match exactly
        #[arg(long)]
        full_match: bool,
        /// Only show identities whose certificate is currently valid
        #[arg(long)]
        valid_only: bool,
        /// Columns to display (comma-separated): label,subject,cn,issuer,serial,not_before,not_after,fingerprint,extended_key_usage,expired. Use +column to append to defaults.
        #[arg(long)]
        columns: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Export matching identities into a PKCS#12 file
    Export {
        /// Label to match (substring unless --full-match)
        #[arg(long, short = 'l')]
        label: Option<String>,
        /// Require the label to match exactly
        #[arg(long)]
        full_match: bool,
        /// Destination file (default: <output_dir>/<label>.p12 from config)
        #[arg(long, short = 'o')]
        output: Option<String>,
        /// Export identities even if their certificate is expired
        #[arg(long)]
        no_validate: bool,
        /// Passphrase handling
        #[arg(long, value_enum)]
        passphrase: Option<PassphraseMode>,
    },
    /// Generate shell completion scripts
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}
