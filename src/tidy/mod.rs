pub mod classifier;
pub mod config;
pub mod executor;
pub mod folders;
pub mod paths;
pub mod plan_config;
pub mod planner;
pub mod project;
pub mod ranges;
pub mod record;
pub mod scan;
pub mod tags;
pub mod util;
