use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use comment_pilot_backend::config::DEFAULT_CONFIG_PATH;

/// Which customers `customers` lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CustomerFilter {
    #[default]
    All,
    Vip,
    Active,
    New,
    Contacted,
}

#[derive(Parser)]
#[command(name = "cp-cli", version, about = "Xiaohongshu comment auto-reply and customer tracker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll tracked notes and reply to new comments until Ctrl-C.
    Run {
        /// Config file path.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Show customer counts by status and reply totals.
    Stats {
        /// Config file path.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// List tracked customers.
    Customers {
        /// Status filter.
        #[arg(value_enum, default_value_t = CustomerFilter::All)]
        filter: CustomerFilter,
        /// Config file path.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Attach a manual note to a customer.
    Note {
        /// Customer user id.
        #[arg(long)]
        user_id: String,
        /// Note text.
        #[arg(long)]
        text: String,
        /// Config file path.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::{Cli, Commands, CustomerFilter};

    #[test]
    fn customers_filter_defaults_to_all() {
        let cli = Cli::try_parse_from(["cp-cli", "customers"]).unwrap();
        match cli.command {
            Commands::Customers { filter, config } => {
                assert_eq!(filter, CustomerFilter::All);
                assert_eq!(config, PathBuf::from("./config.json"));
            },
            _ => panic!("expected customers command"),
        }

        let cli =
            Cli::try_parse_from(["cp-cli", "customers", "vip", "--config", "c.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Customers {
            filter: CustomerFilter::Vip,
            ..
        }));
    }

    #[test]
    fn note_requires_user_and_text() {
        assert!(Cli::try_parse_from(["cp-cli", "note", "--user-id", "u1"]).is_err());
        let cli =
            Cli::try_parse_from(["cp-cli", "note", "--user-id", "u1", "--text", "回访"]).unwrap();
        assert!(matches!(cli.command, Commands::Note { ref text, .. } if text == "回访"));
    }
}
