pub mod phase;
pub mod policy;
