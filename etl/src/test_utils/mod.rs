//! Helpers shared by unit and integration tests.
//!
//! - [`records`] builds records, keys and pipeline configurations tersely.
//! - [`test_destination_wrapper`] observes the calls reaching a destination.
//! - `failpoints` sets up fail points for the duration of a test.

#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod records;
pub mod test_destination_wrapper;
