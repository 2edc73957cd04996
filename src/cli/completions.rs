use crate::cli::args::Cli;
use crate::utils::errors::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io::{self, Write};

const APP_NAME: &str = "keychain-p12";

pub fn handle_completion_command(shell: Shell) -> Result<()> {
    write_completion(shell, &mut io::stdout())
}

/// Write the completion script for `shell` into `out`
pub fn write_completion(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, APP_NAME, out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completion_mentions_subcommands() {
        let mut buf = Vec::new();
        write_completion(Shell::Bash, &mut buf).unwrap();
        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains(APP_NAME));
        assert!(script.contains("export"));
        assert!(script.contains("list"));
    }
}
