pub mod completions;
pub mod config;
pub mod timer;
pub mod watch;

use std::error::Error;
use std::path::PathBuf;

use cardpomo_core::{Config, OwnerId, PomodoroService, ServiceOptions, SqliteStore};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn Error>>;

/// Options shared by every subcommand.
pub struct Globals {
    pub owner: Option<String>,
    pub db: Option<PathBuf>,
}

/// Everything a session command needs, opened from config and the database.
pub struct Context {
    pub owner: OwnerId,
    pub config: Config,
    pub service: PomodoroService<SqliteStore>,
}

impl Context {
    pub fn open(globals: &Globals) -> Result<Self, Box<dyn Error>> {
        let mut config = Config::load()?;
        let owner = match globals.owner.as_deref().map(str::trim) {
            Some(owner) if !owner.is_empty() => OwnerId::new(owner),
            _ => {
                let (owner, assigned) = config.ensure_owner();
                if assigned {
                    config.save()?;
                    tracing::info!(%owner, "assigned owner id");
                }
                owner
            }
        };

        let store = match &globals.db {
            Some(path) => SqliteStore::open_at(path)?,
            None => SqliteStore::open()?,
        };
        let options = ServiceOptions::from_config(&config)?;
        let service = PomodoroService::new(store).with_options(options);

        Ok(Self {
            owner,
            config,
            service,
        })
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
