//! Frame-level phoneme classification over pre-extracted MFCC features.
//!
//! Utterances are windowed into fixed-width context frames, flattened into one table per
//! split, and fed to a classifier behind the [`phoneme::model::PhonemeModel`] trait.

pub mod config;
pub mod phoneme;
