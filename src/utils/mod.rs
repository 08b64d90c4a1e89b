pub mod arena;
pub mod release;
