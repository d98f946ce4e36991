pub mod macros;

pub use macros::IntoTupleSpec;
