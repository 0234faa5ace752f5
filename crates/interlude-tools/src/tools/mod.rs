pub mod func;
pub mod human;
pub mod search;
