use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use nvdb_harvest::config::{ConfigError, DatabaseConfig, HarvestConfig, env_lookup};
use nvdb_harvest::events::{self, DEFAULT_CSV_PATH};
use nvdb_harvest::loader::ConflictPolicy;
use nvdb_harvest::nvdb::NvdbClient;
use nvdb_harvest::pipeline::{NAMESPACE, Pipeline, TARGET_TABLE};
use nvdb_harvest::{db, init_logger, report};

#[derive(Parser, Debug)]
#[command(name = "nvdb-harvest", about = "Load NVDB road objects into PostgreSQL")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a road-object collection and load it into nvdb.vegobjekter_fartsgrense.
    Harvest {
        /// Collection id, overriding NVDB_OBJECT_ID.
        #[arg(long)]
        object_id: Option<String>,

        /// How to treat an existing target table.
        #[arg(long, value_enum, default_value_t = ConflictPolicy::Replace)]
        policy: ConflictPolicy,
    },
    /// Append maintenance events from CSV to nvdb.hendelser.
    LoadEvents {
        #[arg(long, default_value = DEFAULT_CSV_PATH)]
        csv: PathBuf,
    },
    /// Count rows in nvdb.vegobjekter_fartsgrense and print a sample.
    Check,
    /// Join road objects with events and print counts per year and category.
    Report,
}

fn exit_on_config_error<T>(result: Result<T, ConfigError>) -> Result<T, io::Error> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let args = Args::parse();

    match args.command {
        Command::Harvest { object_id, policy } => {
            let config = match object_id {
                Some(id) => HarvestConfig::from_lookup(|key| match key {
                    "NVDB_OBJECT_ID" => Some(id.clone()),
                    _ => env_lookup(key),
                }),
                None => HarvestConfig::from_env(),
            };
            let config = exit_on_config_error(config)?;

            let client =
                NvdbClient::new(config.nvdb.base_url.clone(), config.nvdb.request_timeout)?;
            let pool = db::connect_lazy(&config.database);
            let outcome = Pipeline::new(&config.nvdb, client, pool.clone())
                .with_policy(policy)
                .run()
                .await;
            pool.close().await;

            let outcome = outcome.into_result()?;
            println!(
                "{}: fetched {} objects in {} requests, loaded {} rows",
                outcome.state, outcome.records_fetched, outcome.requests, outcome.rows_loaded
            );
        }
        Command::LoadEvents { csv } => {
            let config = exit_on_config_error(DatabaseConfig::from_env())?;
            let pool = db::connect_lazy(&config);
            let loaded = events::load_events(&pool, &csv, NAMESPACE).await;
            pool.close().await;

            let loaded = loaded?;
            println!(
                "loaded {} rows from {} into {}.{}",
                loaded.rows_written,
                csv.display(),
                NAMESPACE,
                events::HENDELSER_TABLE
            );
        }
        Command::Check => {
            let config = exit_on_config_error(DatabaseConfig::from_env())?;
            let pool = db::connect(&config).await?;
            let summary = report::check_table(&pool, NAMESPACE, TARGET_TABLE).await;
            pool.close().await;

            let summary = summary?;
            println!("found {} rows in {}.{}", summary.row_count, NAMESPACE, TARGET_TABLE);
            if summary.sample.is_empty() {
                println!("table appears to be empty");
            }
            for row in &summary.sample {
                println!("{row:?}");
            }
        }
        Command::Report => {
            let config = exit_on_config_error(DatabaseConfig::from_env())?;
            let pool = db::connect(&config).await?;
            let joined = report::joined_events(&pool).await;
            pool.close().await;

            let counts = report::counts_per_year_category(&joined?);
            print!("{}", report::render_counts(&counts));
        }
    }

    Ok(())
}
