//! Modelshot Core Types
//!
//! Plain data types shared by the parser and the engine. Nothing in this
//! crate performs I/O.
//!
//! - **Geometry**: points, sizes and bounds ([`geometry`] module)
//! - **Layout**: node positions and their normalization ([`layout::Layout`])
//! - **Graph**: content types, fields and relations ([`graph::ContentGraph`])
//! - **Records**: content models, versions and image assets ([`record`], [`asset`])

pub mod asset;
pub mod geometry;
pub mod graph;
pub mod identifier;
pub mod layout;
pub mod record;
pub mod visibility;
