//! Process-local grocery list shared across screens.
//!
//! State lives for the process lifetime only; there is no persistence and no
//! sync. Construct a [`store::GroceryStore`] explicitly and hand it to
//! whichever context needs it.

pub mod model;
pub mod store;
