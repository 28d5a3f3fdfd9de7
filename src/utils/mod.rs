pub mod exec;
pub mod networking;
pub mod prompt;
pub mod string;
