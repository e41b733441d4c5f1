pub use sync::*;

mod sync;
