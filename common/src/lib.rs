pub mod group_by;
pub mod log_setup;

pub use group_by::group_by;
