use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Args, Parser, Subcommand};
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tourdesk::catalog::Collection;
use tourdesk::controller::Controller;
use tourdesk::domain::{TDConfig, TDError};
use tourdesk::model::{Model, Status};
use tourdesk::screen::{CollectionScreen, TableScreen};
use tourdesk::source::{ApiClient, load_data_file};
use tourdesk::ui::TDUI;
use tourdesk::upload::http::{HttpGrantAuthority, HttpObjectStore};
use tourdesk::upload::{DirectUploadClient, LocalFile, UploadBackend, UploadMode};

#[derive(Parser, Debug)]
#[command(version, about = "Terminal admin console for a tour catalogue and its image uploads")]
struct Cli {
    /// Base url of the admin API
    #[arg(long, env = "TOURDESK_API_URL", global = true)]
    api_url: Option<String>,

    /// Bearer token sent with every API call
    #[arg(long, env = "TOURDESK_API_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[arg(long, default_value = "tourdesk.log", global = true)]
    log_file: String,

    /// Timeout of every HTTP request
    #[arg(long, default_value_t = 10_000, global = true)]
    timeout_ms: u64,

    /// Keyboard poll interval of the console
    #[arg(long, default_value_t = 100, global = true)]
    poll_ms: u64,

    #[arg(long, default_value_t = 40, global = true)]
    max_column_width: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Append every uploaded image instead of keeping only the latest one
    #[arg(long)]
    multiple: bool,

    /// Presign endpoint, relative to the API url [default: /api/gallery-images/presign]
    #[arg(long)]
    presign_path: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse an admin collection
    Browse {
        #[arg(value_enum)]
        collection: Collection,
        #[command(flatten)]
        upload: UploadArgs,
    },
    /// Open a local CSV, Parquet, Arrow or JSON file as a table
    View { path: String },
    /// Upload images and print the resulting value as JSON
    Upload {
        #[arg(required = true)]
        files: Vec<String>,
        #[command(flatten)]
        upload: UploadArgs,
    },
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run() -> Result<(), TDError> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;
    info!("Starting tourdesk {}", env!("CARGO_PKG_VERSION"));

    let mut config = TDConfig::default()
        .event_poll_time(cli.poll_ms)
        .max_column_width(cli.max_column_width)
        .request_timeout_ms(cli.timeout_ms);
    config.api_base_url = cli.api_url;
    config.api_token = cli.token;

    match cli.command {
        Command::Browse { collection, upload } => {
            let config = with_upload_args(config, upload);
            let api = ApiClient::from_config(&config)?;
            let screen = collection.open(&api)?;
            let backend = upload_backend(&api, &config);
            run_console(&config, screen, Some(backend))
        }
        Command::View { path } => {
            let data = load_data_file(expand(&path)?)?;
            let screen: Box<dyn TableScreen> = Box::new(CollectionScreen::new(data.into_view()));
            let backend = ApiClient::from_config(&config)
                .ok()
                .map(|api| upload_backend(&api, &config));
            run_console(&config, screen, backend)
        }
        Command::Upload { files, upload } => {
            let config = with_upload_args(config, upload);
            upload_headless(&config, &files)
        }
    }
}

fn init_logging(log_file: &str) -> Result<(), TDError> {
    let file = File::create(expand(log_file)?)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn expand(path: &str) -> Result<PathBuf, TDError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TDError::LoadingFailed(e.to_string()))
}

fn with_upload_args(config: TDConfig, args: UploadArgs) -> TDConfig {
    let config = config.multiple_uploads(args.multiple);
    match args.presign_path {
        Some(path) => config.presign_path(path),
        None => config,
    }
}

fn upload_backend(api: &ApiClient, config: &TDConfig) -> UploadBackend {
    UploadBackend::new(
        HttpGrantAuthority::from_api(api, &config.presign_path),
        HttpObjectStore::new(api.agent().clone()),
    )
}

fn upload_headless(config: &TDConfig, files: &[String]) -> Result<(), TDError> {
    let api = ApiClient::from_config(config)?;
    let authority = HttpGrantAuthority::from_api(&api, &config.presign_path);
    let store = HttpObjectStore::new(api.agent().clone());

    let mode = if config.multiple_uploads {
        UploadMode::Multiple
    } else {
        UploadMode::Single
    };
    let mut client = DirectUploadClient::new(mode)
        .on_failure(|failure| eprintln!("{}: {}", failure.file_name, failure.error));

    let local = files
        .iter()
        .map(|f| expand(f).and_then(|p| LocalFile::read(&p)))
        .collect::<Result<Vec<_>, _>>()?;
    match client.upload(local, &authority, &store) {
        Some(outcome) => eprintln!("{}", outcome.summary()),
        None => eprintln!("No image to upload"),
    }
    println!("{}", serde_json::to_string_pretty(&client.value())?);
    Ok(())
}

fn run_console(
    config: &TDConfig,
    screen: Box<dyn TableScreen>,
    backend: Option<UploadBackend>,
) -> Result<(), TDError> {
    let mut terminal = ratatui::init();
    let result = console_loop(&mut terminal, config, screen, backend);
    ratatui::restore();
    result
}

fn console_loop(
    terminal: &mut DefaultTerminal,
    config: &TDConfig,
    screen: Box<dyn TableScreen>,
    backend: Option<UploadBackend>,
) -> Result<(), TDError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, screen, backend, size.width as usize, size.height as usize);
    let ui = TDUI::new();
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    info!("Bye");
    Ok(())
}
