//! # yangtree
//!
//! A library for managing YANG data models and validating XML instance
//! data against them.
//!
//! The engine has three layers:
//!
//! - Schema model and resolution: modules parsed from YANG text or YIN
//!   XML into an in-memory schema graph, with a deferred-resolution
//!   queue linking types, identities, leafrefs, groupings, augments,
//!   features and list constraints after parsing.
//! - Typed-value decoding: lexical leaf values decoded against
//!   derivation chains, restrictions composing by intersection, unions
//!   tried in order.
//! - Data trees: instance trees built from XML against the frozen
//!   schema, structurally validated (cardinality, keys, unique, choice
//!   exclusivity, mandatory, user-ordered inserts) with leafrefs and
//!   instance-identifiers resolved once the tree is complete.
//!
//! ## Example
//!
//! ```rust,ignore
//! use yangtree::{Context, SchemaFormat};
//!
//! let mut ctx = Context::new(["./modules"]);
//! let module = ctx.parse_module(yang_source, SchemaFormat::Yang)?;
//! let tree = ctx.parse_data(xml_document, 0)?;
//! println!("{}", ctx.print_data(&tree));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod data;
pub mod dict;
pub mod error;
pub mod names;
pub mod printer;
pub mod schema;
pub mod value;
pub mod xml;
pub mod xpath;

mod parser;
mod resolve;

// Re-exports for convenience
pub use context::{Context, SchemaFormat};
pub use data::{options, DataTree};
pub use error::{DataError, Error, ErrorKind, Result, SchemaError};
pub use value::Value;

/// Version of the yangtree library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// NETCONF base namespace
pub const NETCONF_NS: &str = data::NETCONF_NS;

/// YIN schema namespace
pub const YIN_NS: &str = parser::yin::YIN_NS;
