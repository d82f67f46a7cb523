use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "MICROLEND_DB_PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a new lending ledger and print the deployment report
    Deploy {
        /// Identity that deploys the ledger and becomes its first owner
        #[arg(long, env = "MICROLEND_DEPLOYER")]
        deployer: String,

        /// Network name recorded with the deployment
        #[arg(long, env = "MICROLEND_NETWORK", default_value = "localhost")]
        network: String,

        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Apply operations from a CSV file and print the resulting loans
    Run {
        /// Input operations CSV file
        input: PathBuf,

        /// Owner used when the ledger has not been deployed yet
        #[arg(long, env = "MICROLEND_DEPLOYER", default_value = "deployer")]
        deployer: String,

        #[arg(long, env = "MICROLEND_NETWORK", default_value = "localhost")]
        network: String,

        #[command(flatten)]
        storage: StorageArgs,

        /// Print each event to stderr as it is emitted
        #[arg(long)]
        watch: bool,
    },
    /// Print recorded events in emission order
    Log {
        #[command(flatten)]
        storage: StorageArgs,

        /// First event sequence number to print
        #[arg(long, default_value_t = 1)]
        from: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_watch() {
        let cli = Cli::try_parse_from(["microlend", "run", "ops.csv", "--watch"]).unwrap();
        match cli.command {
            Commands::Run { input, watch, .. } => {
                assert_eq!(input, PathBuf::from("ops.csv"));
                assert!(watch);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_log_from() {
        let cli = Cli::try_parse_from(["microlend", "log", "--db-path", "db", "--from", "4"])
            .unwrap();
        match cli.command {
            Commands::Log { storage, from } => {
                assert_eq!(storage.db_path, Some(PathBuf::from("db")));
                assert_eq!(from, 4);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
