pub mod local_persistence;
pub mod remote_call;
