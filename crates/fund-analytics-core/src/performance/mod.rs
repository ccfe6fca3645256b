pub mod risk_adjusted;
pub mod trailing;

pub use trailing::Horizon;
