//! respline CLI Client
//!
//! Sends one or more commands as a single pipeline and prints the replies.

use clap::Parser;
use respline::network::Client;
use respline::{CommandBuilder, Config};
use tracing_subscriber::{fmt, EnvFilter};

/// respline CLI
#[derive(Parser, Debug)]
#[command(name = "respline-cli")]
#[command(about = "Send pipelined commands to a RESP server")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    /// Reply timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    /// Commands, separated by a lone `;` (e.g. `set k v ; get k`)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let mut request = CommandBuilder::new();
    for words in args.command.split(|w| w == ";").filter(|c| !c.is_empty()) {
        if let Err(e) = request.add_command_by_components(words) {
            eprintln!("(error) {}", e);
            std::process::exit(2);
        }
    }

    let config = Config::builder()
        .read_timeout_ms(args.timeout_ms)
        .write_timeout_ms(args.timeout_ms)
        .build();

    let client = match Client::connect(&args.server, &config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Could not connect: {}", e);
            std::process::exit(1);
        }
    };

    match client.call(&request) {
        Ok(response) => {
            for reply in response.replies() {
                println!("{}", reply);
            }
        }
        Err(e) => {
            eprintln!("(error) {}", e);
            std::process::exit(1);
        }
    }
}
