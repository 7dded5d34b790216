use anyhow::Result;
use clap::Parser;

use notebook_stages::cli::{Cli, Command};
use notebook_stages::utils::logging;
use notebook_stages::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置，命令行参数优先
    let mut config = Config::from_env();
    if cli.manifest.is_some() {
        config.workflow_manifest = cli.manifest;
    }
    config.verbose_logging |= cli.verbose;

    // 初始化日志
    logging::init(config.verbose_logging, Some(config.output_log_file.as_path()))?;

    let app = App::initialize(config)?;

    let succeeded = match cli.command {
        Command::Run { ordered, notebooks } => app.run(notebooks, ordered).await?,
        Command::Convert { notebooks } => app.convert(&notebooks).await?,
        Command::Upload { kind, files } => {
            app.upload(kind, &files).await?;
            true
        }
        Command::Results => {
            app.show_results().await?;
            true
        }
        Command::Clear => {
            app.clear().await?;
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
