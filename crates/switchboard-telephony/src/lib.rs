//! REST client for the telephony provider.
//!
//! Three concerns, all against the provider's account-scoped API with HTTP
//! basic auth: creating outbound calls, fetching recorded audio for
//! transcription, and deleting recordings once they have been consumed so
//! stored audio stops accruing cost.

mod client;
mod error;

pub use client::{ProviderSettings, TelephonyClient};
pub use error::TelephonyError;
