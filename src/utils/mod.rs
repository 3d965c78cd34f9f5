//! Shared utilities: grouping, address formatting, configuration validation.

pub mod grouping;
pub mod ip_utils;
pub mod validation;

pub use grouping::{group_by, Grouped};
pub use ip_utils::{address_and_netmask, make_interface_name, with_network_prefix};
pub use validation::{is_valid_mac, validate_network_ranges};
