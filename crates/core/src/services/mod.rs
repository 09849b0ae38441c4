mod importer;

pub use importer::{ImportCoordinator, ImporterState};
