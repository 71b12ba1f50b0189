//! Structured query language for searching cross-browser test run results.
//!
//! ```text
//! JSON payload ── QueryParser ──▶ RunQuery ── bind_to_runs ──▶ ConcreteQuery
//!                                                                   │
//!                                               Binder::bind ◀──────┘
//!                                                    │
//!                                                    ▼
//!                                          Plan::execute ──▶ backend results
//! ```

pub mod ast;
pub mod concrete;
pub mod config;
pub mod cost;
pub mod memory;
pub mod parser;
pub mod plan;
pub mod run;
pub mod sql_compiler;
pub mod status;

pub use ast::{ItemQuery, RunQuery};
pub use concrete::{ConcreteQuery, Exists};
pub use cost::Size;
pub use parser::{ParseError, QueryParser};
pub use plan::{BindError, Binder, Plan};
pub use run::{RunId, TestRun};
pub use status::TestStatus;
