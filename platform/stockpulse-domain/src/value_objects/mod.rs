pub mod company;
pub mod quote;
pub mod snapshot;
