pub mod persistence;

pub use persistence::{BackendLocation, PersistenceBootstrap};
