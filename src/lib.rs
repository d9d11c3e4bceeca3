//! # safezone 🛡️🌃
//!
//! Predict whether an Area/Zone/Time combination in a city is **Safe** or **Unsafe**,
//! trained on per-city tabular safety datasets.
//!
//! Each dataset is cleaned (lower-cased feature text, default-filled categorical
//! columns), ordinal-encoded, rebalanced with SMOTE when the minority class falls
//! under half the majority, and used to train three [`linfa`](https://crates.io/crates/linfa)
//! classifiers. The most accurate one is persisted next to its encoder.
//!
//! ## Features
//! - CSV loading with configurable default-fill table
//! - Ordinal encoder with an "unknown → -1" serving mode
//! - SMOTE oversampling + seeded stratified 80/20 split
//! - Logistic regression, RBF SVM and a 150-tree bagged forest, best accuracy wins
//! - Artifact persistence with `rmp-serde` (MessagePack) behind a swappable store
//! - Exact historical match preferred over model inference when serving
//! - Raw crime-log reshaping into the common schema
//!
//! ## Example
//! ```rust,no_run
//! use std::path::Path;
//! use safezone::config::PipelineConfig;
//! use safezone::serve::Catalog;
//! use safezone::store::FsStore;
//!
//! let cfg = PipelineConfig::default();
//! let mut catalog = Catalog::new(cfg.datasets.clone(), Path::new("data"), FsStore::new("artifacts"), cfg.cleaning);
//! if let Ok(predictor) = catalog.predictor("Chennai") {
//!     let p = predictor.predict("adyar", "south", "night").unwrap();
//!     println!("{} ({:?})", p.label, p.origin);
//! }
//! ```

pub mod balance;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod reshape;
pub mod serve;
pub mod store;
pub mod trainer;

pub use classifier::{Classify, ModelKind, TrainedModel};
pub use record::{Safety, SafetyRecord};
pub use serve::{Catalog, Prediction, Predictor};
