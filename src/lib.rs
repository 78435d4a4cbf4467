//! Mood Recommender
//!
//! A hybrid recommendation engine for films and series. Free-text mood input
//! is classified into emotion categories and embedded; candidates from an
//! approximate nearest-neighbour index are ranked by a weighted fusion of
//! emotion match, content similarity and per-user collaborative affinity.
//! User profiles learn incrementally from interaction feedback.

pub mod catalog;
pub mod config;
pub mod embedding;
pub mod emotion;
pub mod engine;
pub mod error;
pub mod history;
pub mod index;
pub mod math;
pub mod profile;
pub mod ranker;
pub mod server;
mod sync;
pub mod types;

pub use catalog::{Title, TitleCatalog, TitleKind, TitleRecord};
pub use config::AppConfig;
pub use engine::RecommendationEngine;
pub use error::{AppError, Result};
pub use emotion::{Emotion, EmotionVector};
pub use history::ActionKind;
pub use ranker::{RankRequest, Recommendations};
