// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    missing_doc_code_examples,
    private_doc_tests,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::unseparated_literal_suffix,
    clippy::decimal_literal_representation,
    clippy::single_char_lifetime_names,
    clippy::fallible_impl_from,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::deref_by_slicing,
    clippy::default_numeric_fallback,
    clippy::shadow_reuse,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::string_add,
    clippy::use_debug,
    clippy::future_not_send
)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]

mod command;
mod daemon;
mod error;
mod federation;
mod identity;
mod metadata;
mod signer;
mod storage;

use std::process;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use command::Command as _;
use error::Result;
use log::error;

#[derive(Debug, Subcommand)]
enum Command {
    X509CredentialProcess(command::x509::CredentialProcess),
    X509CredentialFileOneshot(command::x509::CredentialFileOneshot),
    X509CredentialFile(command::x509::CredentialFile),
    JwtCredentialProcess(command::jwt::CredentialProcess),
    JwtCredentialFileOneshot(command::jwt::CredentialFileOneshot),
    JwtCredentialFile(command::jwt::CredentialFile),
}

#[async_trait]
impl command::Command for Command {
    async fn execute(self) -> Result<()> {
        match self {
            Self::X509CredentialProcess(cmd) => cmd.execute().await,
            Self::X509CredentialFileOneshot(cmd) => cmd.execute().await,
            Self::X509CredentialFile(cmd) => cmd.execute().await,
            Self::JwtCredentialProcess(cmd) => cmd.execute().await,
            Self::JwtCredentialFileOneshot(cmd) => cmd.execute().await,
            Self::JwtCredentialFile(cmd) => cmd.execute().await,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Log at debug level unless AWS_SVID_HELPER_LOG says otherwise.
    #[arg(long, global = true)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let logger_env = env_logger::Env::new()
        .filter_or("AWS_SVID_HELPER_LOG", if args.debug { "debug" } else { "info" })
        .write_style("AWS_SVID_HELPER_LOG_STYLE");
    env_logger::Builder::from_env(logger_env).init();

    if let Err(e) = args.command.execute().await {
        error!("We encountered an error: {}", e);
        process::exit(1);
    };
}
