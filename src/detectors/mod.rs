//! Pipeline stages
//!
//! Each stage is a pure function over its inputs:
//!
//! - **zscore**: rolling Z-Score turning-point signals
//! - **zigzag**: alternating extremes built from the signals
//! - **harmonic**: XABCD windows scored against seven ratio templates
//! - **triangle**: growing ascending/descending/symmetrical windows
//! - **range**: breakout-bounded support/resistance spans, merged and
//!   annotated with **fibonacci** retracements

pub mod helpers;

pub mod fibonacci;
pub mod harmonic;
pub mod range;
pub mod triangle;
pub mod zigzag;
pub mod zscore;

pub use fibonacci::*;
pub use harmonic::*;
pub use range::*;
pub use triangle::*;
pub use zigzag::*;
pub use zscore::*;
