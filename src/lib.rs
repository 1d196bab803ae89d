pub mod catalog;
pub mod config;
pub mod crossings;
pub mod error;
pub mod explorer;
pub mod field;
pub mod interp;
pub mod lattice;
pub mod linres;
pub mod output;
pub mod report;
pub mod sampler;
pub mod settings;
pub mod snapshot;
pub mod stats;
