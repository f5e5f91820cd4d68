//! Component type definitions
//!
//! PBT models a DC distribution network as trees of typed components:
//!
//! **Roots:**
//! - [`Source`] - Regulated rails (switch-mode, capacitive divider, linear)
//!
//! **Interior nodes:**
//! - [`LoadSwitch`] - Series switching elements with on-resistance
//!
//! **Leaves:**
//! - [`Load`] - Resistive, constant-current, and constant-power sinks
//!
//! Components are assembled into a [`PowerTree`], a flat id-indexed arena
//! that keeps the structure acyclic by construction.

pub mod component;
pub mod efficiency;
pub mod load;
pub mod source;
pub mod switch;
pub mod tree;

pub use component::{Component, Element, StateTags};
pub use efficiency::EfficiencyModel;
pub use load::{Load, LoadKind};
pub use source::{Source, SourceKind};
pub use switch::LoadSwitch;
pub use tree::PowerTree;
