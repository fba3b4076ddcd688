// Domain layer - Job model, failure kinds and admission rules

pub mod errors;
pub mod model;
pub mod rules;
