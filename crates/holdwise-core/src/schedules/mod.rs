pub mod amortization;
pub mod depreciation;
