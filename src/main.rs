// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::process::exit;

use clap::Parser;
use env_logger::Env;
use log::{debug, error};

use crate::cli::{CliArgs, Command};
use crate::config::Config;
use crate::error::ProvisionError;
use crate::password::generate_random_password;
use crate::workflow::provision_from_csv;

mod cli;
mod config;
mod directory;
mod error;
mod graph;
mod mapping;
mod password;
mod report;
mod roster;
mod workflow;

const LOG_LEVEL: &str = "PROVISIONER_LOG_LEVEL";

fn main() {
    // `.env` may carry the log level too, so it is loaded before the logger starts
    let dotenv_path = dotenvy::dotenv().ok();

    env_logger::Builder::from_env(Env::default().filter_or(LOG_LEVEL, "info")).init();

    if let Some(path) = dotenv_path {
        debug!("Loaded environment from: {}", path.display());
    }

    let args = CliArgs::parse();

    match args.command {
        Command::Provision(provision_args) => {
            let outcome = Config::from_env()
                .and_then(|config| provision_from_csv(&provision_args, &config));

            if let Err(e) = outcome {
                fail(e)
            }
        }
        Command::GeneratePassword(password_args) => {
            println!(
                "{}",
                generate_random_password(usize::from(password_args.length))
            )
        }
    }
}

fn fail(e: ProvisionError) -> ! {
    error!("{e}");
    exit(e.exit_code())
}
