pub mod commands;
pub mod registry;

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

pub use registry::{CommandHandler, CommandRegistry, LoggedIn, UserCommandHandler};

#[derive(Parser)]
#[command(name = "gator")]
#[command(about = "A multi-user RSS feed aggregator", long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/gator/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Command to run
    #[arg(value_enum)]
    pub command: CommandName,

    /// Positional arguments for the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum CommandName {
    /// Switch the current user
    Login,
    /// Create a user and log in as them
    Register,
    /// Delete every user and everything they own
    Reset,
    /// List users
    Users,
    /// Fetch feeds periodically, e.g. `agg 1m`
    Agg,
    /// Add a feed and follow it
    #[value(name = "addfeed")]
    AddFeed,
    /// List every feed
    Feeds,
    /// Follow an existing feed by URL
    Follow,
    /// List feeds the current user follows
    Following,
    /// Stop following a feed by URL
    Unfollow,
    /// Show the newest posts from followed feeds
    Browse,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}
