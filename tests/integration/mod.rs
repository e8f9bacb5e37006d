//! End-to-end tests driving the `railyard` binary

mod helpers;
mod test_build;
mod test_failures;
mod test_release;
