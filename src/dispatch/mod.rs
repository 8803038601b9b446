pub mod coordinator;
pub mod transitions;
