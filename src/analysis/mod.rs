//! Static analysis: registry construction followed by a type-checking walk
//! (spec §4.3, §4.4). See `registry` for declaration collection and
//! `checker` for the expression/statement walk that consults it.

pub mod checker;
pub mod registry;

pub use checker::{check_program, check_program_with_prelude, Analysis};
pub use registry::{build_registry, build_registry_from, FunctionInfo, ParamInfo, Registry, StructInfo};
