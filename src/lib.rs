// Embedding-bag reduction: sum, weighted sum and mean of gathered table rows
pub mod error;
pub mod lookup;
pub mod parallel;
pub mod workload;

pub use error::LookupError;
pub use lookup::{embedding_lookup, embedding_lookup_reference, Lookup};
pub use parallel::{embedding_lookup_par, ParallelParams};
