//! Multi-file program loading (spec §4.5). See `loader` for path
//! resolution, the module cache, and the shared namespace the whole run's
//! declarations merge into.

pub mod loader;

pub use loader::{source_for_report, LoadedModule, Loader};
