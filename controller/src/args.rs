use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI configuration for the binary. Any command line
/// flags should go in here.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Coingro kubernetes orchestrator", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the coingro controller within a kubernetes cluster.
    Start(StartArgs),
}

#[derive(Parser, Debug, Clone, Default)]
pub struct StartArgs {
    /// Configuration file(s); later files override earlier ones.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Vec<PathBuf>,

    /// Directory holding user data.
    #[arg(long = "userdir", alias = "user-data-dir", value_name = "PATH")]
    pub user_data_dir: Option<PathBuf>,

    /// Directory to scan for strategy plugins.
    #[arg(long = "strategy-path", value_name = "PATH")]
    pub strategy_path: Option<PathBuf>,

    /// Override the database connection url from the configuration.
    #[arg(long = "db-url", env = "COINGRO_CONTROLLER_DB_URL", value_name = "URL")]
    pub db_url: Option<String>,

    /// Log destination: FILE, syslog[:addr], journald or `default`.
    #[arg(long = "logfile", value_name = "FILE")]
    pub logfile: Option<String>,

    /// Verbose mode (-v, -vv for more, -vvv to get all messages).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Notify systemd about state changes.
    #[arg(long = "sd-notify")]
    pub sd_notify: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_repeated_configs() {
        let cli = Cli::try_parse_from([
            "coingro-controller",
            "start",
            "-c",
            "base.json",
            "--config",
            "override.json",
            "-vv",
            "--sd-notify",
        ])
        .unwrap();
        let Some(Commands::Start(args)) = cli.command else {
            panic!("expected start subcommand");
        };
        assert_eq!(
            args.config,
            vec![PathBuf::from("base.json"), PathBuf::from("override.json")]
        );
        assert_eq!(args.verbosity, 2);
        assert!(args.sd_notify);
    }

    #[test]
    fn subcommand_is_optional_at_parse_time() {
        let cli = Cli::try_parse_from(["coingro-controller"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["coingro-controller", "start", "--bogus"]).is_err());
    }
}
