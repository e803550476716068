//! LazyKV CLI Client
//!
//! Command-line interface for interacting with LazyKV.

use clap::{Parser, Subcommand};
use lazykv::protocol::Response;
use lazykv::Client;

/// LazyKV CLI
#[derive(Parser, Debug)]
#[command(name = "lazykv-cli")]
#[command(about = "CLI for the LazyKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a key-value pair (fails if the key exists)
    Insert {
        /// The key to insert
        #[arg(allow_hyphen_values = true)]
        key: i32,

        /// The value to store
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },

    /// Get a value by key
    Get {
        /// The key to get
        #[arg(allow_hyphen_values = true)]
        key: i32,
    },

    /// Delete a key
    Del {
        /// The key to delete
        #[arg(allow_hyphen_values = true)]
        key: i32,
    },
}

fn main() {
    let args = Args::parse();
    let client = Client::new(args.server);

    let result = match args.command {
        Commands::Insert { key, value } => client.insert(key, value),
        Commands::Get { key } => client.get(key),
        Commands::Del { key } => client.delete(key),
    };

    match result {
        Ok(Response::Value(value)) => println!("{}", value),
        Ok(Response::Ok) => println!("OK"),
        Ok(Response::ErrKey) => {
            println!("ERR_KEY");
            std::process::exit(2);
        }
        Ok(Response::Invalid) => {
            println!("INVALID");
            std::process::exit(3);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
