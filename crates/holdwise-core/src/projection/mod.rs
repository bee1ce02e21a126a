pub mod monthly;
pub mod rent;
pub mod stock;
