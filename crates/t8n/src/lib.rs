#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(any(test, feature = "test-utils")), warn(unused_crate_dependencies))]

mod errors;
pub use errors::{T8nError, T8nResult};

mod types;
pub use types::{RejectedTransaction, T8nOutput, T8nRequest, TransitionResult};

mod traits;
pub use traits::{TransitionTool, TreeKeyResolver};

mod debug;

mod geth;
pub use geth::GethTransitionTool;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
