pub mod data_core;
pub mod document;
pub mod performance;
pub mod search;
pub mod shadow_tree;
