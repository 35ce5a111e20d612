use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

use clap::Parser;
use factord::{AppError, AppResult, Connection, ValueFrame, SENTINEL};

/// Round-trip load generator: connects, sends the same value a number of
/// times, prints per-iteration latency, then ends the session with the
/// sentinel.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// server address
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,
    /// server port
    #[arg(short, long)]
    port: u16,
    /// the value sent in every request
    #[arg(short, long, default_value_t = 5)]
    number: i64,
    /// how many round trips to time
    #[arg(short, long, default_value_t = 10)]
    iterations: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    if cli.number == SENTINEL {
        return Err(AppError::InvalidValue(
            "the request value 0 is reserved for ending the session".to_string(),
        ));
    }

    let ip: Ipv4Addr = cli
        .ip
        .parse()
        .map_err(|_| AppError::InvalidValue(format!("server ip: {}", cli.ip)))?;
    let addr = SocketAddr::from((ip, cli.port));

    let mut connection = Connection::connect(addr).await?;
    println!(
        "connected to {} at {}, sending {} x {}",
        connection.peer_addr(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        cli.number,
        cli.iterations
    );

    for i in 0..cli.iterations {
        let start = Instant::now();

        connection.send_value(ValueFrame::new(cli.number)).await?;
        let reply = connection.read_value().await?;

        let millis = start.elapsed().as_secs_f64() * 1000.0;
        println!(
            "iteration {}: result = {}, roundtrip = {:.3} ms",
            i,
            reply.value(),
            millis
        );
    }

    // end the session; the server sends nothing back for the sentinel
    connection.send_value(ValueFrame::new(SENTINEL)).await?;

    Ok(())
}
