//! Per-subscriber change streams.
//!
//! Every subscriber owns its own store watch; events are translated to
//! `Upsert`/`Delete` and numbered per connection from zero.

mod stream;
mod translate;

pub use stream::SubscriberStream;
pub use translate::{translate, Translated};
