// Binary entry point for the command-line sync tool.
use anyhow::{Context, Result};
use simplelog::{
    ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::env;
use std::fs::OpenOptions;
use std::time::Duration;
use tasklink::cli::{self, Command, SyncArgs};
use tasklink::client::NotionClient;
use tasklink::config::Config;
use tasklink::context::{AppContext, StandardContext};
use tasklink::notifier::{DesktopNotifier, LogNotifier, Notifier};
use tasklink::picker;
use tasklink::vault::Vault;

/// How long the process waits for desktop notifications before exiting.
const NOTIFICATION_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let invocation = match cli::parse_args(&args) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'tasklink --help' for usage.");
            std::process::exit(2);
        }
    };

    if invocation.command == Command::Help {
        cli::print_help("tasklink");
        return Ok(());
    }

    let ctx = StandardContext::new(invocation.root.clone());
    init_logging(&ctx, invocation.verbose);

    match invocation.command {
        Command::Config => show_config(&ctx),
        Command::Sync(args) => run_sync(&ctx, args).await,
        Command::Todos => list_todos(&ctx).await,
        Command::Databases => list_databases(&ctx).await,
        Command::Help => Ok(()),
    }
}

fn init_logging(ctx: &dyn AppContext, verbose: bool) {
    let term_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = ctx.get_log_path()
        && let Ok(file) = OpenOptions::new().create(true).append(true).open(&path)
    {
        loggers.push(WriteLogger::new(
            LevelFilter::Debug,
            simplelog::Config::default(),
            file,
        ));
    }
    // Only fails when a logger is already installed.
    let _ = CombinedLogger::init(loggers);
}

fn load_config(ctx: &dyn AppContext) -> Result<Config> {
    Config::load(ctx).map_err(|e| {
        if Config::is_missing_config_error(&e) {
            let path = Config::get_path_string(ctx).unwrap_or_default();
            anyhow::anyhow!(
                "No configuration found. Run 'tasklink config' and edit {}",
                path
            )
        } else {
            e
        }
    })
}

fn show_config(ctx: &dyn AppContext) -> Result<()> {
    match Config::load(ctx) {
        Ok(_) => {}
        Err(e) if Config::is_missing_config_error(&e) => {
            Config::default().save(ctx)?;
            log::info!("Wrote default configuration");
        }
        Err(e) => return Err(e),
    }
    println!("{}", Config::get_path_string(ctx)?);
    Ok(())
}

async fn run_sync(ctx: &dyn AppContext, args: SyncArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let vault_path = args
        .vault
        .clone()
        .or_else(|| config.vault_path.clone())
        .context("No vault given. Pass --vault <path> or set vault_path")?;
    let vault = Vault::new(vault_path, ctx.get_lock_dir()?, config.recent_limit);

    let notifier: Box<dyn Notifier> = if args.quiet || !config.desktop_notifications {
        Box::new(LogNotifier)
    } else {
        Box::new(DesktopNotifier::default())
    };

    let result = tasklink::sync(&config, &vault, notifier.as_ref()).await;
    tokio::task::block_in_place(|| notifier.flush(NOTIFICATION_GRACE));
    let report = result?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}

fn notion_client(config: &Config) -> Result<NotionClient> {
    let credentials = config.credentials()?;
    NotionClient::new(&credentials, config.notion_options()).map_err(|e| anyhow::anyhow!(e))
}

async fn list_todos(ctx: &dyn AppContext) -> Result<()> {
    let config = load_config(ctx)?;
    config.statuses.validate()?;
    let database_id = config.database_id()?;
    let client = notion_client(&config)?;
    let todos = picker::load_open_todos(&client, database_id, &config.statuses).await?;
    for todo in &todos {
        println!("{}", picker::link_line(todo, &config.statuses));
        println!("    {}", picker::summary(todo));
    }
    Ok(())
}

async fn list_databases(ctx: &dyn AppContext) -> Result<()> {
    let config = load_config(ctx)?;
    let client = notion_client(&config)?;
    for db in picker::list_databases(&client).await? {
        println!("{}  {}", db.id, db.title);
    }
    Ok(())
}
