// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// provisioner - Microsoft 365 user provisioning from CSV.
///
/// This tool creates users from a CSV roster, adds them to groups derived from their business roles, and assigns licenses through the Microsoft Graph API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))] // Require at least one subcommand
#[command(propagate_version = true)] // Display version in subcommand help
pub(crate) struct CliArgs {
    #[clap(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Provision users listed in a CSV file.
    ///
    /// This command creates missing users, adds them to the groups their roles and explicit group lists require, assigns the requested licenses, and writes CSV and JSON reports.
    Provision(ProvisionArgs),

    /// Generate a random password.
    ///
    /// The password is sampled from ASCII letters, digits and punctuation.
    GeneratePassword(GeneratePasswordArgs),
}

/// Arguments specific to the `provision` subcommand.
#[derive(Parser, Debug)]
pub(crate) struct ProvisionArgs {
    /// Path to the input CSV roster
    #[clap(long)]
    pub(crate) csv: PathBuf,

    /// Path of the CSV report
    #[clap(short, long, default_value = "out/provision_report.csv")]
    pub(crate) report: PathBuf,

    /// Path of the JSON report
    #[clap(short, long, default_value = "out/provision_report.json")]
    pub(crate) json: PathBuf,

    /// Dry run - no changes, just simulate actions
    #[clap(short, long)]
    pub(crate) what_if: bool,

    /// The length of the temporary password given to created users
    #[clap(short, long, default_value = "20", value_parser = clap::value_parser!(u16).range(8..=256))]
    pub(crate) password_length: u16,

    /// Path to a YAML file replacing the built-in role and entitlement tables
    #[clap(short, long)]
    pub(crate) mapping_path: Option<PathBuf>,
}

/// Arguments specific to the `generate-password` subcommand.
#[derive(Parser, Debug)]
pub(crate) struct GeneratePasswordArgs {
    /// The length of the generated password
    #[clap(short, long, default_value = "16", value_parser = clap::value_parser!(u16).range(1..=4096))]
    pub(crate) length: u16,
}
