//! sqlite-runner CLI
//!
//! Walks through the statement runner end to end: create a table, insert
//! with an explicit commit, insert inside an auto-commit scope, read rows
//! back three ways, then run parameterized queries on a connection and
//! through a session.

use clap::Parser;
use sqlite_runner::{param_set, text, Engine, EngineConfig, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sqlite-runner", version, about)]
struct Cli {
    /// Connection URL (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every statement
    #[arg(long)]
    echo: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_url("sqlite+pysqlite:///:memory:"),
    };
    if let Some(url) = cli.url {
        config.url = url;
    }
    config.echo |= cli.echo;

    let engine = Engine::new(config)?;
    run(&engine)?;
    Ok(())
}

fn run(engine: &Engine) -> Result<()> {
    let insert = text("INSERT INTO some_table (x, y) VALUES (:x, :y)");

    // Create the table and seed it, committing explicitly
    {
        let mut conn = engine.connect()?;
        conn.execute(&text("CREATE TABLE IF NOT EXISTS some_table (x int, y int)"))?;
        conn.execute_batch(
            &insert,
            &[param_set! { "x" => 1, "y" => 1 }, param_set! { "x" => 2, "y" => 4 }],
        )?;
        conn.commit()?;
    }

    // Commits when the closure returns Ok
    engine.begin(|conn| -> Result<()> {
        conn.execute_batch(
            &insert,
            &[param_set! { "x" => 6, "y" => 8 }, param_set! { "x" => 9, "y" => 10 }],
        )?;
        Ok(())
    })?;

    let mut conn = engine.connect()?;
    let select = text("SELECT x, y FROM some_table ORDER BY x, y");

    println!("x y");
    for (x, y) in conn.execute(&select)?.tuples::<(i64, i64)>()? {
        println!("{} {}", x, y);
    }

    for row in conn.execute(&select)? {
        let y: i64 = row.get("y")?;
        println!("Row: {} {}", row.get::<_, i64>("x")?, y);
    }

    for mapping in conn.execute(&select)?.mappings() {
        println!("{} {}", mapping["x"], mapping["y"]);
    }

    let filtered = conn.execute_with(
        &text("SELECT x, y FROM some_table WHERE y > :y ORDER BY x, y"),
        &param_set! { "y" => 2 },
    )?;
    for row in filtered {
        println!("x: {} y: {}", row["x"], row["y"]);
    }
    drop(conn);

    // Same pre-bound statement, this time through a session
    let bound = text("SELECT x, y FROM some_table WHERE y > :y ORDER BY x, y").bind("y", 6)?;
    let mut session = engine.session();
    for row in session.execute(&bound)? {
        println!("x: {} y: {}", row["x"], row["y"]);
    }
    session.close()?;

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("sqlite_runner=debug")
    } else {
        EnvFilter::new("sqlite_runner=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
