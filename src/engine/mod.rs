pub mod coverage;
pub mod import;
pub mod lifecycle;
pub mod stats;
