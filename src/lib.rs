//! News Signal Bot
//!
//! Turns crypto news headlines into calibrated directional signals for
//! perpetual futures and learns from how those signals played out.
//!
//! ## Architecture
//!
//! ```text
//! RSS feeds → Ingester → Quality gate (LLM) → Resolver → Technicals → Classifier (LLM)
//!                                                                         ↓
//!                          Distributor (Telegram) ← Store ← Calibration ←─┘
//!                                                    ↑ ↓
//!                              Learner (weights) ← Feedback (price after 3h)
//! ```

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod feedback;
pub mod ingester;
pub mod monitor;
pub mod notify;
pub mod resolver;
pub mod storage;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod types_tests;
#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod error_tests;
