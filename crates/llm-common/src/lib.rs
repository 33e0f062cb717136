pub mod completion;
pub mod error;
