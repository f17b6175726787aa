pub mod bevel;
pub mod creation;
pub mod query;
