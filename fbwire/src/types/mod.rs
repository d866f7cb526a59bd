//! Type integration with external types
//!
//! Conversion between [`Value`][crate::Value] and external types.
//!
//! Available for:
//!
//! - [`time`][::time]'s [`Date`][td], [`Time`][tt], [`PrimitiveDateTime`][tp],
//!   requires `time` feature
//!
//! [td]: ::time::Date
//! [tt]: ::time::Time
//! [tp]: ::time::PrimitiveDateTime

#[cfg(feature = "time")]
mod time;
