//! CLI конвейера и webhook-слушатель

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use garment_productivity::{
    config::DEFAULT_DATA_PATH,
    pipeline::{self, Stages},
    webhook::{self, InProcessRunner},
    PipelineConfig, WebhookConfig,
};

#[derive(Parser, Debug)]
#[command(name = "garment-productivity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Garment Productivity Prediction Pipeline", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Каталог для подготовленных данных и модели
    #[arg(long, global = true, env = "GARMENT_ARTIFACT_DIR", default_value = ".")]
    artifact_dir: PathBuf,

    /// Аргументы команды по умолчанию (all)
    #[command(flatten)]
    data: DataArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Путь к CSV с данными
    #[arg(long, env = "GARMENT_DATA_PATH", default_value = DEFAULT_DATA_PATH)]
    data_path: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Только подготовка данных
    Prepare(DataArgs),
    /// Только обучение модели
    Train,
    /// Только оценка модели
    Evaluate,
    /// Полный конвейер (по умолчанию)
    All(DataArgs),
    /// Webhook-слушатель: перезапуск конвейера на push
    Serve {
        #[command(flatten)]
        data: DataArgs,

        /// Адрес для прослушивания
        #[arg(long, env = "GARMENT_LISTEN_ADDR", default_value = "0.0.0.0:5000")]
        listen_addr: SocketAddr,

        /// Каталог проекта; относительные пути разрешаются от него
        #[arg(long, env = "GARMENT_PROJECT_DIR", default_value = ".")]
        project_dir: PathBuf,

        /// Выполнять `git pull` в каталоге проекта перед каждым запуском
        #[arg(long)]
        git_pull: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Cli {
        artifact_dir,
        data,
        command,
    } = Cli::parse();
    let command = command.unwrap_or_else(|| Command::All(data.clone()));

    // train и evaluate читают только артефакты
    let (data_path, stages) = match command {
        Command::Prepare(args) => (args.data_path, Stages::PREPARE),
        Command::Train => (data.data_path, Stages::TRAIN),
        Command::Evaluate => (data.data_path, Stages::EVALUATE),
        Command::All(args) => (args.data_path, Stages::ALL),
        Command::Serve {
            data,
            listen_addr,
            project_dir,
            git_pull,
        } => {
            let config = WebhookConfig {
                listen_addr,
                project_dir,
                git_pull,
                pipeline: PipelineConfig::new(data.data_path, artifact_dir),
            };
            return serve(config);
        }
    };

    let config = PipelineConfig::new(data_path, artifact_dir);
    tracing::info!("Starting Garment Productivity Prediction Pipeline...");
    let report = pipeline::run(&config, stages).context("pipeline failed")?;

    if let Some(instruction) = report.halted {
        println!("{}", instruction);
        return Ok(());
    }
    if let Some(metrics) = report.metrics {
        println!("Model Evaluation Results:");
        println!("RMSE: {:.4}", metrics.rmse);
        println!("MAE: {:.4}", metrics.mae);
        println!("R2: {:.4}", metrics.r2);
    }
    Ok(())
}

fn serve(config: WebhookConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime
        .block_on(webhook::serve(config, Arc::new(InProcessRunner)))
        .context("webhook listener failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_takes_top_level_data_path() {
        let cli = Cli::try_parse_from(["garment-productivity", "--data-path", "other.csv"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.data.data_path, PathBuf::from("other.csv"));
    }

    #[test]
    fn artifact_dir_is_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["garment-productivity", "train", "--artifact-dir", "out"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Train)));
        assert_eq!(cli.artifact_dir, PathBuf::from("out"));
    }
}
