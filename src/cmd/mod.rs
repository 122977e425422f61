pub mod catalog;
pub mod evaluate;
pub mod history;
pub mod stats;
