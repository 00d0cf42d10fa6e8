mod display;
mod id;
mod instr;
mod ir;
mod operand;
mod typ;

pub use display::*;
pub use id::*;
pub use instr::*;
pub use ir::*;
pub use operand::*;
pub use typ::*;
