pub mod classifier;
pub mod composer;
pub mod consolidator;
pub mod report;
