//! # deployfacts - Network assignment and deployment facts for cloud clusters
//!
//! This library assigns addresses to the nodes of a cloud cluster and turns
//! the resulting network topology into the per-node fact documents consumed
//! by a configuration-management engine.
//!
//! ## Overview
//!
//! A cluster is a set of nodes sharing named network groups (admin,
//! management, storage, public, floating, fixed). Before deployment every
//! node gets its addresses from the groups' address ranges; the serializers
//! then describe each node's interfaces, its role and the cluster-wide
//! settings in one attribute map per node.
//!
//! ## Key Features
//!
//! - **Idempotent assignment**: repeated requests return the same addresses
//! - **Safe under concurrency**: per-group locking and a uniqueness check on
//!   (group, address)
//! - **Multinode and HA facts**: HA clusters get VIPs, a primary controller
//!   and swift extras
//! - **Neutron network scheme**: Open vSwitch bridges and patches per node
//!   for neutron clusters
//! - **Persistent state**: assignments can be saved and reloaded between runs
//!
//! ## Architecture
//!
//! - `config`: YAML inventory schema and validation
//! - `config_loader`: Configuration file loading
//! - `inventory`: Cluster, network group and node records behind a query port
//! - `ip`: Address ranges, pools, the assignment store and the assigner
//! - `topology`: Per-node network entries
//! - `facts`: Multinode and HA fact serializers
//! - `utils`: Grouping, address formatting and validation helpers
//! - `orchestrator`: Preparation, serialization and document output
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use deployfacts::{config_loader, orchestrator};
//! use deployfacts::orchestrator::{OutputFormat, RunOptions};
//! use std::path::{Path, PathBuf};
//!
//! let config = config_loader::load_config(Path::new("inventory.yaml"))?;
//! let options = RunOptions {
//!     output_dir: PathBuf::from("deployment_facts"),
//!     state_path: Some(PathBuf::from("assignments.json")),
//!     cluster: None,
//!     format: OutputFormat::Json,
//! };
//!
//! // Writes deployment_<cluster>.json for every cluster
//! let report = orchestrator::run(&config, &options)?;
//! assert!(report.is_success());
//! # Ok::<(), color_eyre::Report>(())
//! ```

pub mod config;
pub mod config_loader;
pub mod facts;
pub mod inventory;
pub mod ip;
pub mod orchestrator;
pub mod topology;
pub mod utils;

pub use config::Config;
pub use facts::{SerializeError, TopologySerializer};
pub use inventory::{Inventory, MemoryInventory};
pub use ip::{AllocationError, AssignmentRegistry, AssignmentStore, NodeNetworkAssigner};
