//! Partition-aware OpenSees TCL writer
//!
//! Turns a meshed STKO model document into `definitions.tcl` and `main.tcl`
//! scripts, one script for every MPI process with per-partition branches.

pub mod api;
pub mod cdata;
pub mod config;
pub mod context;
pub mod emitters;
pub mod error;
pub mod format;
pub mod launcher;
pub mod mass;
pub mod models;
pub mod partition;
pub mod registry;
pub mod writer;
pub mod xobject;

pub use config::WriterConfig;
pub use context::{EmissionContext, IdAllocator};
pub use error::{CdataError, EmitError, EmitResult, LaunchError};
pub use models::ModelDocument;
pub use registry::{Emitter, Registry};
pub use writer::{TclWriter, WriteReport};
