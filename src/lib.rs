pub mod archive;
pub mod args;
pub mod cleanup;
pub mod error;
pub mod matcher;
pub mod processor;
pub mod report;
pub mod scan;
pub mod sidecar;
pub mod writer;
