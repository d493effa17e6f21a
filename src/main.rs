use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use homeledger_lib::{
    catalog::Catalog, config::AppConfig, grid::Grid, migrate, prefs::PrefsHandle,
    remote::RemoteStore, status::SavingFlag, view::SortDirection, SqliteStore, LOG_TARGET,
};

#[derive(Debug, Parser)]
#[command(name = "homeledger", about = "Household record categories", version)]
struct Cli {
    /// Also write JSON logs under the data directory.
    #[arg(long, global = true)]
    log_file: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or upgrade the database schema.
    Migrate,
    /// List categories.
    Categories {
        #[arg(long)]
        json: bool,
    },
    /// Print the records of a category using its saved view.
    Records {
        category_id: String,
        /// Only rows containing this text in any column.
        #[arg(long)]
        search: Option<String>,
        /// Emit raw records as JSON instead of the table view.
        #[arg(long)]
        json: bool,
    },
    /// Click a column header: ascending, descending, then natural order.
    Sort { category_id: String, key: String },
    /// List the fields of a category in column order.
    Fields {
        category_id: String,
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(2);
        }
    };

    let cli = Cli::parse();
    if cli.log_file {
        if let Err(err) = homeledger_lib::init_file_logging(&config, &config.log_dir()) {
            eprintln!("Error: {err:#}");
            process::exit(2);
        }
    } else {
        homeledger_lib::init_logging(&config);
    }

    match run(cli.command, &config) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

fn run(command: Commands, config: &AppConfig) -> Result<i32> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("create data directory {}", config.data_dir.display()))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(async {
        let db_path = config.db_path();
        let store = SqliteStore::open(&db_path)
            .await
            .with_context(|| format!("open database {}", db_path.display()))?;
        tracing::debug!(target: LOG_TARGET, event = "cli_start", command = ?command);
        let result = handle(command, store.clone(), config).await;
        store.pool().close().await;
        result
    })
}

async fn open_grid(
    remote: Arc<dyn RemoteStore>,
    config: &AppConfig,
    category_id: &str,
) -> Result<Grid> {
    let prefs = PrefsHandle::json_file(config.prefs_path());
    let grid = Grid::open(
        remote,
        prefs,
        category_id,
        config.default_column_width,
        SavingFlag::new(),
    )
    .await?;
    Ok(grid)
}

async fn handle(command: Commands, store: SqliteStore, config: &AppConfig) -> Result<i32> {
    let remote: Arc<dyn RemoteStore> = Arc::new(store);
    match command {
        Commands::Migrate => {
            let names: Vec<&str> = migrate::migration_names().collect();
            println!("Database is at schema {}", names.last().copied().unwrap_or("none"));
            Ok(0)
        }
        Commands::Categories { json } => {
            let mut catalog = Catalog::new(remote);
            catalog.reload().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(catalog.categories())?);
            } else {
                for category in catalog.categories() {
                    let marker = if category.is_active { "" } else { " (inactive)" };
                    println!("{}\t{}{}", category.id, category.name, marker);
                }
            }
            Ok(0)
        }
        Commands::Fields { category_id, json } => {
            let mut catalog = Catalog::new(remote);
            let schema = catalog.load_schema(&category_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(schema.fields())?);
            } else {
                for field in schema.fields() {
                    let required = if field.is_required { " *" } else { "" };
                    let multi = if field.is_multi { " [multi]" } else { "" };
                    println!(
                        "{}\t{}\t{}{}{}",
                        field.key, field.name, field.field_type, required, multi
                    );
                }
            }
            Ok(0)
        }
        Commands::Records {
            category_id,
            search,
            json,
        } => {
            let mut grid = open_grid(remote, config, &category_id).await?;
            if json {
                let payload = json!({
                    "category": grid.session().category(),
                    "records": grid.session().records().records(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(0);
            }
            if let Some(search) = search {
                grid.set_search(search);
            }
            let columns = grid.visible_columns();
            let header: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            println!("{}", header.join("\t"));
            for row in grid.rows() {
                let cells: Vec<&str> = columns.iter().map(|c| row.cell(&c.key)).collect();
                println!("{}", cells.join("\t"));
            }
            Ok(0)
        }
        Commands::Sort { category_id, key } => {
            let mut grid = open_grid(remote, config, &category_id).await?;
            grid.click_header(&key)?;
            let sort = &grid.prefs().sort;
            let direction = match sort.direction {
                SortDirection::Asc => "ascending",
                SortDirection::Desc => "descending",
            };
            if sort.is_natural() {
                println!("Natural order, {direction}");
            } else {
                println!("Sorted by {} {direction}", sort.key);
            }
            Ok(0)
        }
    }
}
