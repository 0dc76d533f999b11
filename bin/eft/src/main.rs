#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use clap::Parser;
use eft::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Cli::parse().init_telemetry()?.run().await
}
