#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod errors;
pub use errors::{ForkError, ForkResult};

mod fork;
pub use fork::{
    Capabilities, Fork, ForkSpec, SystemContract, BEACON_ROOTS_CONTRACT,
    MAX_FORKCHOICE_UPDATED_VERSION,
};

mod schedule;
pub use schedule::{Activation, ForkSchedule, TransitionFork};
