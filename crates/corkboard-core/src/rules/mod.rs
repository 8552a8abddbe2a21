//! Input rules enforced before a mutation reaches the engine

pub mod validation;

pub use validation::validate_mutation;
