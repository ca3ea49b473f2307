use clap::Parser;
use mangamaker::cli::{CliOptions, Command};
use mangamaker::config::{ServiceConfig, build_client, setup_logging};
use mangamaker::constants::{DEFAULT_TITLE, INPUT_FILE};
use mangamaker::editor::setup_editor;
use mangamaker::pipeline::Pipeline;
use mangamaker::progress::ProgressStore;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = CliOptions::parse();

    setup_logging(cli.debug)?;

    let config = match ServiceConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration error: {}", err);
            return Err(err.into());
        }
    };
    let store = ProgressStore::new(config.context_file.clone());

    match cli.command {
        Command::Generate { input, chunk_size } => {
            setup_editor(&input, &store, DEFAULT_TITLE)?;
            let pipeline = Pipeline::from_config(build_client()?, &config);
            let pages = pipeline.run_chapter(&input, chunk_size).await?;
            for page in &pages {
                println!("{}", page.display());
            }
            info!("Wrote {} pages to {}", pages.len(), config.output_dir.display());
        }
        Command::Init { title } => {
            setup_editor(&INPUT_FILE, &store, &title)?;
        }
        Command::Status => {
            let context = store.load()?;
            println!("{}", serde_json::to_string_pretty(&context)?);
        }
        Command::Serve {
            port,
            listen_address,
        } => {
            mangamaker::web::setup_server(&listen_address, port, config).await?;
        }
    }
    Ok(())
}
