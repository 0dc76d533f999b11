#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod cli;
pub use cli::{Cli, EftSubcommand, FillArgs, FixtureFormat, HashArgs};

mod traits;
pub use traits::TestExecutor;

mod files;
pub use files::{json_files, read_json, InputFile};

pub mod fill;
pub use fill::{FillCase, FillRunner, FilledCase};

pub mod hash;
pub use hash::{cumulative_hash, hash_fixtures, HashRunner};
