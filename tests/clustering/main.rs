#![allow(clippy::cast_precision_loss)]

mod consensus;
mod metrics;
