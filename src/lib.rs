//! # Event Watch
//!
//! Polls upstream event listings (concert tours, hockey schedules, recurring
//! conventions), keeps a persistent record of every item already seen, and
//! notifies only about items that are new since the last run.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌───────────────────────────┐   ┌───────────┐
//! │  Sources    │──▶│ Filter ▶ Identity ▶ Known? │──▶│ Notifier  │
//! │ BIT/NHL/... │   │      Change Detector       │   │ Telegram  │
//! └─────────────┘   └─────────────┬─────────────┘   └───────────┘
//!                                 ▼
//!                          ┌─────────────┐
//!                          │ Store (JSON)│
//!                          └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! event-watch sources            # check configured monitors
//! event-watch run --dry-run      # classify without saving or sending
//! event-watch run nhl:canes      # one monitor
//! event-watch stats              # what is being tracked
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Candidate and tracked item types |
//! | [`filter`] | Location and keyword predicates |
//! | [`identity`] | Stable identifier resolution |
//! | [`store`] | Known-item store and run lock |
//! | [`detector`] | New-item classification |
//! | [`traits`] | `Source` and `Notifier` seams |
//! | [`source_bandsintown`] | Bandsintown artist events |
//! | [`source_nhl`] | NHL team schedule |
//! | [`source_conventions`] | Configured recurring conventions |
//! | [`source_shops`] | Local shop event pages |
//! | [`message`] | Notification text |
//! | [`notify`] | Telegram and console notifiers |
//! | [`monitors`] | Monitor specifiers and wiring |
//! | [`pipeline`] | Run orchestration |

pub mod config;
pub mod detector;
pub mod filter;
pub mod get;
pub mod identity;
pub mod logging;
pub mod message;
pub mod models;
pub mod monitors;
pub mod notify;
pub mod pipeline;
pub mod progress;
pub mod source_bandsintown;
pub mod source_conventions;
pub mod source_nhl;
pub mod source_shops;
pub mod sources;
pub mod stats;
pub mod store;
pub mod traits;
