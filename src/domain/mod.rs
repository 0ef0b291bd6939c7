// Benchmark data model
pub mod benchmark;

// Regression classification
pub mod regression;

// Storage port
pub mod repositories;

// Domain-specific error types
pub mod errors;

// Port interfaces
pub mod ports;
