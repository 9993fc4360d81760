//! The SSA IR this language compiles to: instruction set, builder, CFG
//! analysis, the two-phase optimizer, and the lowering pass from the parser's
//! AST.

pub mod analysis;
pub mod builder;
pub mod lower;
pub mod mir;
pub mod opt;

pub use analysis::*;
pub use builder::*;
pub use lower::*;
pub use mir::*;
pub use opt::*;
