//! Public entry points: the JSON serving surface and its C ABI wrapper.

pub mod ffi;
pub mod serving;

pub use serving::{envelope, predict_json, predict_json_for, train_csv, TrainSummary};
