// swimmer_sim/src/io/mod.rs

pub mod chunks;
pub mod trajectory;
