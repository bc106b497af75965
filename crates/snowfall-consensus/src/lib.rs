//! Snow-family consensus core.
//!
//! This crate implements the consensus path of a snowfall validator node:
//!
//! - **Snowball**: the n-ary repeated-poll decision primitive
//! - **Bootstrap**: recovery of the accepted DAG frontier from peers,
//!   with bounded concurrency and a durable execution queue
//! - **Linearize**: the shims that cut DAG history over to a linear
//!   chain at the stop vertex
//!
//! Everything network-, storage-, and VM-shaped is reached through the
//! narrow traits in [`common`], [`vertex`], and [`vm`]; each chain runs
//! its core on a single cooperative task.
//!
//! # Example
//!
//! ```
//! use snowfall_consensus::{Bag, Parameters, Snowball};
//! use snowfall_ids::Id;
//!
//! let choice = Id::from_bytes([1; 32]);
//! let mut sb = Snowball::new(Parameters::default(), choice).unwrap();
//!
//! let mut votes = Bag::new();
//! votes.add_count(choice, 18);
//! assert!(sb.record_poll(&votes));
//! ```

mod bag;
mod beacons;
mod choices;
mod error;
mod linearize;
mod params;
mod snowball;

pub mod bootstrap;
pub mod common;
pub mod context;
pub mod metrics;
pub mod queue;
pub mod vertex;
pub mod vm;

pub use bag::Bag;
pub use beacons::{Beacon, BeaconSet};
pub use bootstrap::{Bootstrapper, Config, OnFinished, OutstandingRequests};
pub use choices::{Decidable, Status};
pub use common::BootstrapableEngine;
pub use context::{ChainContext, Halter, SharedConfig, VmState};
pub use error::{Error, Result};
pub use linearize::{InitializeOnLinearizeVm, LinearizeOnInitializeVm};
pub use params::Parameters;
pub use snowball::Snowball;
