pub mod id;
pub mod model;
pub mod occupancy;
pub mod op;
pub mod pattern;
pub mod pattern_op;
pub mod persist;
pub mod registry;

pub use id::{EntityId, IdGen};
pub use model::*;
pub use op::{BlockOp, Invert, apply_block};
pub use pattern::*;
pub use pattern_op::{PatternOp, apply_pattern};
pub use registry::{PlacementRule, UnitPatch, UnitTag, unit_def};
