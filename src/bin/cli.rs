//! TideKV CLI Client
//!
//! Sends one command to a TideKV server and prints the reply.
//!
//! ```text
//! tidekv-cli set greeting hello
//! tidekv-cli zadd board 1.5 alice
//! tidekv-cli zquery board 0 "" 0 10
//! ```

use clap::Parser;
use tidekv::Client;

/// TideKV CLI
#[derive(Parser, Debug)]
#[command(name = "tidekv-cli")]
#[command(about = "CLI for the TideKV key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    server: String,

    /// Command name followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    match client.request(&args.command) {
        Ok(response) => println!("{}", response),
        Err(e) => {
            eprintln!("Request failed: {}", e);
            std::process::exit(1);
        }
    }
}
