//! Market data models
//!
//! This module contains the core data types of the engine:
//! - `symbol` - Normalized ticker symbol (Symbol)
//! - `quote` - Immutable live quote (Quote)
//! - `batch` - Merged batch outcome (BatchResult)

use std::borrow::Cow;

mod batch;
mod quote;
mod symbol;

pub use batch::BatchResult;
pub use quote::Quote;
pub use symbol::Symbol;

/// Provider name as recorded in attempt traces. Built-in ids are static.
pub type ProviderId = Cow<'static, str>;
