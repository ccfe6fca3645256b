pub mod exposure;
pub mod position_based;
pub mod return_based;
