pub mod scheduler;

pub use scheduler::run as run_scheduler;
