use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wowvfs::db::{SCHEMA_FILE, SchemaRegistry};
use wowvfs::{Environment, EnvironmentConfig};

#[derive(Parser)]
#[command(
    name = "wowvfs",
    about = "Browse and extract assets of a local World of Warcraft installation",
    version,
    author,
    long_about = "Reads files from the local archive storage of an installation, lists them through the listfile namespace and decodes client database tables."
)]
struct Cli {
    /// Set the logging level, overriding RUST_LOG
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// JSON configuration file
    #[arg(short, long, global = true, env = "WOWVFS_CONFIG")]
    config: Option<PathBuf>,

    /// Installation root holding .build.info
    #[arg(short, long, global = true, env = "WOWVFS_GAME_DIR")]
    game_dir: Option<PathBuf>,

    /// Directory holding per-version listfile.csv and database.xml
    #[arg(short, long, global = true, env = "WOWVFS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Product of the build to use (wow, wow_classic, ...)
    #[arg(short, long, global = true, env = "WOWVFS_PRODUCT")]
    product: Option<String>,

    /// Locale code replacing the build's text locale
    #[arg(long, global = true, env = "WOWVFS_LOCALE")]
    locale: Option<String>,

    /// Output format
    #[arg(long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Plain text
    Text,
    /// Compact JSON
    Json,
    /// Indented JSON
    JsonPretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active build and what is loaded
    Info,

    /// List listfile paths under a directory
    Ls {
        /// Directory prefix, such as world/maps
        prefix: String,

        /// Only paths with this extension
        #[arg(short, long)]
        ext: Option<String>,
    },

    /// List listfile paths with an extension
    FindExt {
        /// Extension, with or without the leading dot
        ext: String,
    },

    /// Write a file from the storage to disk
    Extract {
        /// Path or FileDataID
        file: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List root WMO files
    Wmo,

    /// Load client database tables and show their row counts
    Tables {
        /// Tables to load, every described table when empty
        names: Vec<String>,
    },

    /// Print one decoded table row as JSON
    Row {
        /// Table name
        table: String,

        /// Record ID
        id: u32,
    },
}

#[derive(Serialize)]
struct Info<'a> {
    version: String,
    locale: String,
    product: Option<&'a str>,
    branch: Option<&'a str>,
    listfile_entries: usize,
    directories: usize,
    described_tables: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut config = match &cli.config {
        Some(path) => EnvironmentConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EnvironmentConfig::default(),
    };
    if let Some(dir) = &cli.game_dir {
        config = config.with_game_dir(dir);
    }
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(product) = &cli.product {
        config = config.with_product(product);
    }
    if let Some(locale) = &cli.locale {
        config = config.with_locale(locale);
    }
    match &cli.command {
        Commands::Tables { names } if !names.is_empty() => {
            config = config.with_tables(names.iter().cloned());
        }
        Commands::Row { table, .. } => config = config.with_tables([table.clone()]),
        Commands::Extract { .. } => config = config.with_listfile(false),
        _ => {}
    }

    let mut env = Environment::init(config).context("failed to initialize environment")?;
    run(&cli, &mut env)
}

fn init_logging(cli: &Cli) {
    let filter = match cli.log_level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: &Cli, env: &mut Environment) -> Result<()> {
    match &cli.command {
        Commands::Info => {
            let described_tables = SchemaRegistry::load(&env.version_dir().join(SCHEMA_FILE))
                .ok()
                .map(|registry| registry.len());
            let build = env.build();
            let info = Info {
                version: build.version.to_string(),
                locale: env
                    .locale()
                    .code()
                    .map_or_else(|| build.locale.clone(), str::to_string),
                product: build.product.as_deref(),
                branch: build.branch.as_deref(),
                listfile_entries: env.namespace().len(),
                directories: env.namespace().directory_count(),
                described_tables,
            };
            if cli.format == OutputFormat::Text {
                println!("Version:          {}", info.version);
                println!("Locale:           {}", info.locale);
                println!("Product:          {}", info.product.unwrap_or("-"));
                println!("Branch:           {}", info.branch.unwrap_or("-"));
                println!("Listfile entries: {}", info.listfile_entries);
                println!("Directories:      {}", info.directories);
                match info.described_tables {
                    Some(count) => println!("Described tables: {count}"),
                    None => println!("Described tables: -"),
                }
            } else {
                print_json(cli.format, &info)?;
            }
        }
        Commands::Ls { prefix, ext } => {
            let names: Vec<&str> = env
                .namespace()
                .iter_by_path_and_extension(prefix, ext.as_deref().unwrap_or_default())
                .collect();
            print_names(cli.format, &names)?;
        }
        Commands::FindExt { ext } => {
            let names: Vec<&str> = env.namespace().iter_by_extension(ext).collect();
            print_names(cli.format, &names)?;
        }
        Commands::Extract { file, output } => {
            let data = match file.parse::<u32>() {
                Ok(id) => env.read_file_by_id(id),
                Err(_) => env.read_file(file),
            }
            .with_context(|| format!("failed to read {file}"))?;
            std::fs::write(output, &*data)
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!("Wrote {} bytes to {}", data.len(), output.display());
        }
        Commands::Wmo => {
            env.build_wmo_file_list();
            print_names(cli.format, env.wmo_files())?;
        }
        Commands::Tables { .. } => {
            env.load_database().context("failed to load database")?;
            let Some(store) = env.tables() else {
                bail!("database is not loaded");
            };
            let counts: Vec<(&str, usize)> = store
                .names()
                .into_iter()
                .filter_map(|name| store.get(name).map(|table| (name, table.len())))
                .collect();
            if cli.format == OutputFormat::Text {
                for (name, rows) in &counts {
                    println!("{name:<40} {rows:>8}");
                }
            } else {
                let counts: std::collections::BTreeMap<_, _> = counts.into_iter().collect();
                print_json(cli.format, &counts)?;
            }
        }
        Commands::Row { table, id } => {
            env.load_database().context("failed to load database")?;
            let row = env
                .table(table)
                .and_then(|t| t.get(*id))
                .with_context(|| format!("no row {id} in {table}"))?;
            let json = if cli.format == OutputFormat::Json {
                serde_json::to_string(row)?
            } else {
                serde_json::to_string_pretty(row)?
            };
            println!("{json}");
        }
    }
    Ok(())
}

fn print_names<S: AsRef<str> + Serialize>(format: OutputFormat, names: &[S]) -> Result<()> {
    if format == OutputFormat::Text {
        for name in names {
            println!("{}", name.as_ref());
        }
        Ok(())
    } else {
        print_json(format, names)
    }
}

fn print_json<T: Serialize + ?Sized>(format: OutputFormat, value: &T) -> Result<()> {
    let json = match format {
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
        _ => serde_json::to_string(value)?,
    };
    println!("{json}");
    Ok(())
}
