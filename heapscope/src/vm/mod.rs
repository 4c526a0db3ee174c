//! # VM metadata
//!
//! The inspected runtime exports tables describing its own native types,
//! struct fields and constants. This module reads them and turns them into
//! validated, typed struct accessors.
//!
//! - `types`, `constants`, `fields`: the three catalogs
//! - `structs`: field contract binding and struct views
//! - `layout`: the declared struct contracts
//! - `flags`: layout-relevant command line flags
//! - `runtime`: the context object tying it together

pub mod constants;
pub mod fields;
pub mod flags;
pub mod layout;
pub mod runtime;
pub mod structs;
pub mod table;
pub mod types;

pub use constants::ConstantCatalog;
pub use fields::{FieldInfo, FieldTable};
pub use flags::VmFlags;
pub use runtime::Runtime;
pub use structs::{Scope, StructOverlay, View};
pub use types::{TypeCatalog, TypeId, TypeInfo};
