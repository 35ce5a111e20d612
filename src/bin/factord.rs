use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use factord::{setup_tracing, AppResult, Daemon, ServeMode, ServerConfig};

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// listen address, overrides the config file
    #[arg(long)]
    pub ip: Option<String>,
    /// listen port, overrides the config file and the pid-derived default
    #[arg(short, long)]
    pub port: Option<u16>,
    /// serve one client at a time instead of one worker per connection
    #[arg(long)]
    pub iterative: bool,
    /// directory for rotated log files, overrides the config file
    #[arg(long)]
    pub log_dir: Option<String>,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser)]
pub enum Command {
    PrintConfig,
}

fn main() -> AppResult<()> {
    // load the .env file if there is one
    dotenv().ok();

    //setup config
    let commandline: CommandLine = CommandLine::parse();
    let config_path = match &commandline.conf {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            // fall back to ./conf.toml only when it exists; the defaults
            // cover everything otherwise
            let path = PathBuf::from("conf.toml");
            path.exists().then_some(path)
        }
    };
    let mut config = ServerConfig::load(config_path.as_deref())?;

    // command line flags win over the config file
    if let Some(ip) = commandline.ip {
        config.network.ip = ip;
    }
    if let Some(port) = commandline.port {
        config.network.port = Some(port);
    }
    if commandline.iterative {
        config.service.mode = ServeMode::Iterative;
    }
    if let Some(log_dir) = commandline.log_dir {
        config.log.log_dir = Some(log_dir);
    }

    if let Some(Command::PrintConfig) = commandline.command {
        println!("{:#?}", config);
        return Ok(());
    }

    let _tracing_guard = setup_tracing(&config.log, commandline.verbose)?;

    let daemon = Daemon::new(Arc::new(config));
    daemon.start()
}
