//! Training
//!
//! The trainer performs gradient-accumulated steps over the shared model;
//! the loop driver owns epoch/step counting, periodic logging, periodic
//! evaluation, and checkpoint writes.

mod checkpoint;
mod train_loop;
mod trainer;

pub use checkpoint::CheckpointWriter;
pub use train_loop::{train_model, TrainReport};
pub use trainer::Trainer;
