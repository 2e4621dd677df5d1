use clap::Parser;

use linkgate::config::{DEFAULT_CONFIG_PATH, StaticConfig, init_config};
use linkgate::errors::LinkgateError;
use linkgate::runtime::modes::run_server;
use linkgate::system::init_logging;

#[derive(Debug, Parser)]
#[command(name = "linkgate", version, about = "Short-link resolution server")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Print a sample configuration with default values and exit
    #[arg(long)]
    generate_config: bool,
}

fn exit_with(err: &LinkgateError) -> ! {
    eprintln!("{}", err.format_colored());
    std::process::exit(1);
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.generate_config {
        print!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    }

    dotenvy::dotenv().ok();

    let config = StaticConfig::load_from(&args.config).unwrap_or_else(|e| exit_with(&e));
    let _log_guard = init_logging(&config.logging)?;
    init_config(config);

    run_server().await
}
