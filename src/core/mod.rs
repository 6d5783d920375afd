pub mod analytics;
pub mod deadline;
pub mod delay;
pub mod mood;
pub mod priority;
pub mod summary;
pub mod task;
