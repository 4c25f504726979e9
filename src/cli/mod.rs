pub mod check;

pub use check::CheckCommand;
