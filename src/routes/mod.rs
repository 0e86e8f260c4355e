pub mod directory;
pub mod donations;
