use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use jsonsend::cli::Cli;
use jsonsend::cli::Commands;
use jsonsend::cli::SourceArgs;
use jsonsend::config::ConfigFile;
use jsonsend::config::DEFAULT_CONFIG_PATH;
use jsonsend::dispatcher::Dispatcher;
use jsonsend::document::default_document;
use jsonsend::outputter::OutPutter;
use jsonsend::relay::Relay;
use jsonsend::session::Session;
use jsonsend::session::SessionError;
use jsonsend::shell::Shell;
use jsonsend::shell::spawn_stdin_reader;
use jsonsend::validator::Settings;
use jsonsend::validator::ValidationError;
use jsonsend::validator::Validator;
use miette::Diagnostic;
use miette::Result;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug, Diagnostic)]
pub enum JsonSendError {
    #[error("Failed to read {path}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse toml file: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("Invalid relay base: {0}")]
    RelayBase(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    RequestFailed(String),
}

/// Builds the request settings.
///
/// The config file is read when given with `--config`, or when
/// `jsonsend.toml` exists in the working directory. Flags given on the
/// command line win over the file.
fn load_settings(cli: &Cli) -> Result<Settings, JsonSendError> {
    let (path, required) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let mut settings = if required || path.exists() {
        let contents = read_file(&path)?;
        let config: ConfigFile = toml::from_str(&contents).map_err(JsonSendError::TomlParsing)?;
        Validator::new(&config, &contents, &path.display().to_string())
            .validate()
            .map_err(JsonSendError::ValidationError)?
    } else {
        Settings::default()
    };

    if let Some(url) = &cli.url {
        settings.destination = url.clone();
    }

    if let Some(method) = cli.method {
        settings.method = method;
    }

    if let Some(base) = &cli.relay_base {
        settings.relay = Some(Relay::parse(base).map_err(JsonSendError::RelayBase)?);
    }

    if cli.no_relay {
        settings.relay = None;
    }

    Ok(settings)
}

fn read_file(path: &Path) -> Result<String, JsonSendError> {
    std::fs::read_to_string(path).map_err(|source| JsonSendError::FileError {
        path: path.display().to_string(),
        source,
    })
}

/// Returns the source name and text of the document to work on, `None`
/// meaning the built-in example.
fn read_source(source: &SourceArgs) -> Result<Option<(String, String)>, JsonSendError> {
    if let Some(data) = &source.data {
        return Ok(Some(("--data".into(), data.clone())));
    }

    let Some(path) = &source.file else {
        return Ok(None);
    };

    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|source| JsonSendError::FileError {
                path: "<stdin>".into(),
                source,
            })?;
        return Ok(Some(("<stdin>".into(), text)));
    }

    Ok(Some((path.display().to_string(), read_file(path)?)))
}

fn session_from(
    settings: &Settings,
    source: &SourceArgs,
) -> Result<Session, JsonSendError> {
    let mut session = Session::new(settings.destination.clone());

    if let Some((name, text)) = read_source(source)? {
        session.load_text(name, text)?;
    }

    Ok(session)
}

async fn send_once(
    settings: &Settings,
    dispatcher: &Dispatcher,
    source: &SourceArgs,
) -> Result<(), JsonSendError> {
    let out = OutPutter::new();
    let mut session = session_from(settings, source)?;

    if source.data.is_some() || source.file.is_some() {
        session.apply()?;
    }

    let request = match session.begin_dispatch(settings.method) {
        Ok(request) => request,
        Err(err) => {
            out.status(session.status());
            return Err(err.into());
        }
    };

    let spinner = out.spinner(&request);
    let report = dispatcher.dispatch(&request).await;
    spinner.finish_and_clear();

    session.finish_dispatch(&report);
    out.attempts(&report.attempts);
    out.status(session.status());
    out.response(session.response());

    if report.outcome.is_error {
        return Err(JsonSendError::RequestFailed(report.outcome.message));
    }

    Ok(())
}

fn validate_once(settings: &Settings, source: &SourceArgs) -> Result<(), JsonSendError> {
    let out = OutPutter::new();
    let mut session = session_from(settings, source)?;

    let result = session.validate();
    out.status(session.status());

    Ok(result?)
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(&cli)?;
    let dispatcher = Dispatcher::new(settings.relay.clone(), settings.headers.clone());

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let session = Session::new(settings.destination.clone());
            Shell::new(session, dispatcher, settings.method)
                .run(spawn_stdin_reader())
                .await;
        }
        Commands::Send(source) => send_once(&settings, &dispatcher, &source).await?,
        Commands::Validate(source) => validate_once(&settings, &source)?,
        Commands::Example => {
            OutPutter::new().document("Example document", &default_document());
        }
    }

    Ok(())
}
