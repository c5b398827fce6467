//! External prime reconciliation (OPS/CNV)

pub mod cache;
pub mod reconciler;
pub mod source;

pub use cache::PrimeCache;
pub use reconciler::{DecaissementInput, PrimeReconciler};
pub use source::{HttpPrimeSource, PrimeSource, SourceError};
