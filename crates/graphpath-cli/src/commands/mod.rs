pub mod mutate;
pub mod pointer;
pub mod query;
