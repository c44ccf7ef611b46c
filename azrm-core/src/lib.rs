//! azrm Core
//!
//! Resource identifiers, named locks and the provider CRUD contract for
//! Azure Resource Manager resources.

pub mod client;
pub mod config;
pub mod connection_info;
pub mod locks;
pub mod poll;
pub mod provider;
pub mod resource;
pub mod resource_id;
pub mod services;
pub mod timeouts;
pub mod validate;
