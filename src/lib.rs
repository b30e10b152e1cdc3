pub mod assertion;
pub mod checker;
pub mod handle;
pub mod stress;
mod sync;
mod version;

pub use assertion::AssertionError;
pub use checker::Checker;
pub use handle::{ReadRef, Ref, Shared};
