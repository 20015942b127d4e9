//! Garment demo - walks a simulated database connection through its
//! lifecycle in the global pool, then hammers an explicit pool from several
//! threads.

use anyhow::{bail, Context, Result};
use clap::Parser;
use garment::{BoxError, Connection, ConnectionPool};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "garment-demo")]
#[command(about = "Exercise the garment connection registry")]
struct Args {
    /// Worker threads for the stress run
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Operations per worker thread
    #[arg(short, long, default_value = "1000")]
    iterations: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// In-memory stand-in for a database client.
struct SimulatedClient {
    name: String,
    connected: AtomicBool,
    pings: AtomicU64,
}

impl SimulatedClient {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: AtomicBool::new(true),
            pings: AtomicU64::new(0),
        }
    }

    /// Drop the connection behind the pool's back.
    fn terminate(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Connection for SimulatedClient {
    fn ping(&self) -> Result<(), BoxError> {
        self.pings.fetch_add(1, Ordering::Relaxed);
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(format!("{} connection is lost", self.name).into())
        }
    }

    fn close(&self) -> Result<(), BoxError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn reconnect(&self) -> Result<(), BoxError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(args.debug)
        .compact()
        .init();

    run_lifecycle()?;

    let pool = Arc::new(ConnectionPool::builder().name("stress").build());
    run_stress(&pool, args.threads, args.iterations)?;

    let stats = serde_json::to_string(&pool.stats())?;
    info!("Final stress pool state: {}", stats);

    Ok(())
}

fn run_lifecycle() -> Result<()> {
    let pool = ConnectionPool::global();
    info!("Registering db in the {} pool", pool.name());

    pool.set("db", SimulatedClient::new("db"));
    info!("Registered connections: {}", pool.count());
    pool.ping("db").context("fresh connection should answer ping")?;

    pool.get::<SimulatedClient>("db")
        .context("db should be registered")?
        .terminate();
    match pool.ping("db") {
        Ok(()) => bail!("ping succeeded on a terminated connection"),
        Err(err) => info!("Ping after termination failed as expected: {}", err),
    }

    pool.reconnect("db")?;
    pool.ping("db").context("reconnected connection should answer ping")?;
    info!("Reconnected db");

    pool.remove("db");
    match pool.ping("db") {
        Err(err) if err.is_not_found() => info!("{}", err),
        other => bail!("expected db to be gone, got {:?}", other),
    }
    info!("Registered connections: {}", pool.count());

    Ok(())
}

fn run_stress(pool: &Arc<ConnectionPool>, threads: usize, iterations: usize) -> Result<()> {
    const KEYS: [&str; 4] = ["postgres", "redis", "broker", "search"];

    info!(
        "Stress run: {} threads x {} operations on {} keys",
        threads,
        iterations,
        KEYS.len()
    );

    let failures = AtomicU64::new(0);
    std::thread::scope(|scope| {
        for t in 0..threads {
            let pool = Arc::clone(pool);
            let failures = &failures;
            scope.spawn(move || {
                for i in 0..iterations {
                    let key = KEYS[(t + i) % KEYS.len()];
                    match i % 5 {
                        0 => {
                            pool.set(key, SimulatedClient::new(key));
                        }
                        1 | 2 => {
                            if let Err(err) = pool.ping(key) {
                                if !err.is_not_found() {
                                    warn!("Unexpected ping failure: {}", err);
                                    failures.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                        3 => {
                            let _ = pool.get::<SimulatedClient>(key);
                        }
                        _ => pool.remove(key),
                    }
                }
            });
        }
    });

    for (key, outcome) in pool.ping_all() {
        if let Err(err) = outcome {
            warn!("{} unhealthy after stress run: {}", key, err);
            failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    let failures = failures.load(Ordering::Relaxed);
    if failures > 0 {
        bail!("{} unexpected failures during stress run", failures);
    }
    info!("Stress run finished with {} connections registered", pool.count());
    Ok(())
}
