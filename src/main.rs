use std::io::Read as _;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use blog_trace::{
    Config,
    cli::{Cli, Commands, ConfigCommands, OutputArgs},
    client::TraceSource,
    core::FlowRequest,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { host, port } => {
            let config = Config::load()?;
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            blog_trace::api::serve(&config, &host, port).await?;
        }

        Commands::Ideas {
            tech,
            audience,
            output,
        } => {
            let title = format!("ideas: {tech}");
            stream(FlowRequest::ideas(tech, audience), &output, title).await?;
        }

        Commands::Review { file, output } => {
            let content = read_draft(&file)?;
            let title = format!("review: {}", file.display());
            stream(FlowRequest::review(content), &output, title).await?;
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = Config::load()?;
                println!("{}", config.to_toml()?);
            }
            ConfigCommands::Path => {
                let path = Config::config_path()?;
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

async fn stream(request: FlowRequest, output: &OutputArgs, title: String) -> anyhow::Result<()> {
    request.validate()?;

    let config = Config::load()?;
    let source = TraceSource::resolve(&config, output.server.as_deref(), &request)?;

    if output.plain {
        blog_trace::tui::plain::run(source, request, output.expand).await
    } else {
        blog_trace::tui::run(source, request, title).await
    }
}

fn read_draft(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))
    }
}
