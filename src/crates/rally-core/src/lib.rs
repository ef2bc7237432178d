//! # rally-core
//!
//! Client library for the orientation-guide support board: students cast
//! one support vote, answer the OG poll, post short wall messages and share
//! longer experience stories, with live updates pushed by the hosted
//! database service.
//!
//! ## Features
//!
//! - **Visitor identity** - a pseudo-anonymous id derived once from passive
//!   environment signals and persisted locally
//! - **Data gateway** - fetch, count, insert and subscribe over five record
//!   streams, backed by PostgREST + realtime or by in-process tables
//! - **Boards** - view-state holders with guarded submissions and
//!   deduplicated live feeds
//! - **Dual-location config** - `~/.rally/rally.toml` and `./.rally/rally.toml`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rally_core::{mount, Backend, MessageWall, RallyConfig, RallyContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> rally_core::Result<()> {
//! let context = RallyContext::build(RallyConfig::default(), Backend::Offline).await?;
//!
//! let wall = mount(Arc::new(MessageWall::new(context.gateway.clone()))).await;
//! wall.post("Thank you OGs!").await?;
//!
//! for message in wall.messages() {
//!     println!("{}", message.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod flows;
pub mod gateway;
pub mod identity;
pub mod logging;
pub mod session;
pub mod timefmt;

pub use config::{ConfigLoader, RallyConfig};
pub use context::{Backend, RallyContext};
pub use error::{RallyError, Result};
pub use feed::{Applied, Feed, FeedItem};
pub use flows::{
    mount, Board, ExperienceBoard, ExperienceDraft, GuideSpotlight, MessageWall, Mounted,
    PollBoard, PollOption, PollTally, SubmissionState, SupportBoard, SupportSnapshot,
};
pub use gateway::{
    Filter, Gateway, MemoryGateway, NewRecord, Query, Record, RecordKind, RestGateway,
    Subscription,
};
pub use identity::{IdentityDeriver, VisitorId};
pub use session::VisitorSession;

/// Version of the rally crates
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
