pub mod job;
pub mod runner;
pub mod scheduler;

pub use job::Job;
pub use runner::{JobRunner, ShellRunner};
pub use scheduler::{RunReport, Scheduler};
