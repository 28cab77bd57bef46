//! Surefire config compiler.
//!
//! Compiles the Surefire configuration language into runtime objects
//! from `surefire-core`: state vector configs into [`StateVector`]s and
//! state machine configs into [`StateMachineAssembly`]s.
//!
//! ```rust
//! use sfc::{compile_state_machine, compile_state_vector};
//!
//! let sv = compile_state_vector(
//!     "[Telemetry]\n\
//!      U64 time\n\
//!      U32 state\n\
//!      F64 altitude\n",
//! )?;
//!
//! let mut asm = compile_state_machine(
//!     "[STATE_VECTOR]\n\
//!      U64 time  @ALIAS G\n\
//!      U32 state @ALIAS S\n\
//!      F64 altitude\n\
//!      \n\
//!      [Initial]\n\
//!      .STEP\n\
//!          altitude > 9000: -> Safed\n\
//!      \n\
//!      [Safed]\n",
//!     &sv,
//! )?;
//!
//! asm.machine.step()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Compilation is a pipeline: [`token::tokenize`] produces a positioned
//! token stream, [`sv_parse`]/[`sm_parse`] build parse trees (calling
//! [`expr_parse`] on expression fragments), and the assemblers in
//! [`sv_assembly`]/[`sm_assembly`] validate, bind names, type-check,
//! and instantiate the runtime graph. Every failure along the way is a
//! [`ConfigError`] carrying an error code and the offending source
//! position.

pub mod diag;
pub mod expr_assembly;
pub mod expr_parse;
pub mod layout;
pub mod sm_assembly;
pub mod sm_parse;
pub mod sv_assembly;
pub mod sv_parse;
pub mod token;

pub use diag::ConfigError;
pub use expr_assembly::{ExpressionAssembly, SymbolTable};
pub use layout::LayoutReport;
pub use sm_assembly::StateMachineAssembly;
pub use surefire_core::{Error, StateMachine, StateVector};

pub use sm_assembly::compile_file as compile_state_machine_file;
pub use sm_assembly::compile_str as compile_state_machine;
pub use sv_assembly::compile_file as compile_state_vector_file;
pub use sv_assembly::compile_str as compile_state_vector;
