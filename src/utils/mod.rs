pub mod fs;
pub mod recent;
