// swimmer_core/src/utils/mod.rs

pub mod algebra;
pub mod device;
pub mod integrators;
pub mod tensor;
