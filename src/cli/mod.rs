//! CLI command parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Blog idea and review agents with live trace streaming.
#[derive(Parser)]
#[command(name = "blogtrace")]
#[command(about = "Blog idea and review agents with live trace streaming")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Host to bind to [default: from config, 127.0.0.1].
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to [default: from config, 7890].
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Suggest blog ideas for a technology.
    Ideas {
        /// Technology to research.
        tech: String,

        /// Target audience.
        #[arg(short, long, default_value = "初心者")]
        audience: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Review a blog draft.
    Review {
        /// Draft file, or `-` for stdin.
        #[arg(default_value = "-")]
        file: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Where to run a request and how to show it.
#[derive(Debug, Clone, Default, Args)]
pub struct OutputArgs {
    /// Server to stream from instead of running the agent in process.
    #[arg(long, env = "BLOGTRACE_SERVER")]
    pub server: Option<String>,

    /// Print traces as lines instead of opening the trace view.
    #[arg(long)]
    pub plain: bool,

    /// With --plain, print item details under each item.
    #[arg(long, requires = "plain")]
    pub expand: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the merged configuration.
    Show,

    /// Show the configuration file path.
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_verbose_flag() {
        let cli = Cli::parse_from(["blogtrace", "-vv", "config", "path"]);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["blogtrace", "config", "show", "-v"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn cli_parses_serve_defaults() {
        let cli = Cli::parse_from(["blogtrace", "serve"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert!(port.is_none());
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_parses_serve_with_options() {
        let cli = Cli::parse_from(["blogtrace", "serve", "-H", "0.0.0.0", "-p", "3000"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(3000));
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_parses_ideas_command() {
        let cli = Cli::parse_from(["blogtrace", "ideas", "Rust", "-a", "上級者", "--plain"]);
        match cli.command {
            Commands::Ideas {
                tech,
                audience,
                output,
            } => {
                assert_eq!(tech, "Rust");
                assert_eq!(audience, "上級者");
                assert!(output.plain);
                assert!(!output.expand);
            }
            _ => panic!("expected Ideas command"),
        }
    }

    #[test]
    fn ideas_audience_defaults_to_beginners() {
        let cli = Cli::parse_from(["blogtrace", "ideas", "Rust"]);
        match cli.command {
            Commands::Ideas { audience, .. } => assert_eq!(audience, "初心者"),
            _ => panic!("expected Ideas command"),
        }
    }

    #[test]
    fn cli_parses_review_command() {
        let cli = Cli::parse_from([
            "blogtrace",
            "review",
            "draft.md",
            "--server",
            "http://localhost:7890",
        ]);
        match cli.command {
            Commands::Review { file, output } => {
                assert_eq!(file, PathBuf::from("draft.md"));
                assert_eq!(output.server.as_deref(), Some("http://localhost:7890"));
            }
            _ => panic!("expected Review command"),
        }
    }

    #[test]
    fn review_reads_stdin_by_default() {
        let cli = Cli::parse_from(["blogtrace", "review"]);
        match cli.command {
            Commands::Review { file, .. } => assert_eq!(file, PathBuf::from("-")),
            _ => panic!("expected Review command"),
        }
    }

    #[test]
    fn expand_requires_plain() {
        assert!(Cli::try_parse_from(["blogtrace", "ideas", "Rust", "--expand"]).is_err());
        assert!(Cli::try_parse_from(["blogtrace", "ideas", "Rust", "--plain", "--expand"]).is_ok());
    }

    #[test]
    fn cli_parses_config_commands() {
        let cli = Cli::parse_from(["blogtrace", "config", "show"]);
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show
            }
        ));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
