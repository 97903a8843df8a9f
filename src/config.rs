//! Layered settings: struct defaults, then `config.toml`, then `CADENCE__`
//! environment overrides.

mod load;
mod schema;

pub use schema::*;

#[cfg(test)]
mod tests;
