pub mod exception_symbols;
pub mod quote;
pub mod task;
