pub mod capabilities;
pub mod run;
pub mod serve;
pub mod validate;

/// Exit code for documents that cannot be read
pub const EXIT_INVALID_INPUT: i32 = 2;

/// Exit code for documents that ran and failed
pub const EXIT_FAILURE: i32 = 1;
