// memsim - contiguous memory allocation simulator
// First/best/worst-fit placement over a fixed-size linear address space

#![warn(rust_2018_idioms)]

pub mod alloc;
pub mod report;
pub mod sim;
pub mod trace;

// Re-exports for convenience
pub use alloc::{Block, BlockState, MemoryAllocator, PlacementPolicy, ProcessId};
pub use sim::Simulation;
pub use trace::{Command, Trace};

/// memsim error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error(transparent)]
        Alloc(#[from] crate::alloc::AllocError),

        #[error(transparent)]
        Trace(#[from] crate::trace::TraceError),

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
