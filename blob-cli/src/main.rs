mod commands;
mod errors;
mod params;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use blob_store::BlobManager;
use clap::Parser;
use rocksdb_kv::RocksKv;
use tracing_subscriber::EnvFilter;

use crate::errors::CliError;
use crate::params::Args;

fn run(args: Args) -> Result<bool, CliError> {
    let kv = RocksKv::open(&args.kv_config())?;
    let blobs = BlobManager::open(Arc::new(kv), &args.blob_config())?;
    commands::execute(&blobs, args.command, &mut io::stdin().lock(), &mut io::stdout().lock())
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:?}", e);
            eprintln!("blob-cli: {}", e);
            ExitCode::from(2)
        }
    }
}
