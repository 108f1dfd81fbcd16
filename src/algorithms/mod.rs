pub mod content;
pub mod hpke;
