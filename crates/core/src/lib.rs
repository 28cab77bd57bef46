//! Surefire core runtime.
//!
//! The deterministic half of Surefire: typed shared memory (the state
//! vector) and the configuration-driven state machine executor. The
//! config-language front end lives in the `surefire-compiler` crate and
//! produces the objects defined here; integrators that generate configs
//! programmatically can also build them directly.
//!
//! Determinism contract: all allocation happens while a vector or
//! machine is being built. [`StateMachine::step`] performs no heap
//! traffic and no I/O, and a machine is driven by exactly one logical
//! executor; the handle types are intentionally not `Send`.

pub mod element;
pub mod error;
pub mod expression;
pub mod region;
pub mod scalar;
pub mod state_machine;
pub mod state_vector;
pub mod stats;

pub use element::{AnyElement, ByteStore, Element, new_store};
pub use error::{Error, Result};
pub use expression::{BinOp, Expr, StatKind, StatsRef, UnOp};
pub use region::Region;
pub use scalar::{ELEMENT_TYPES, ElementType, Scalar, Value};
pub use state_machine::{Action, Block, NO_STATE, State, StateMachine};
pub use state_vector::{ElementConfig, RegionConfig, StateVector};
pub use stats::{ExpressionStats, MAX_WINDOW};
