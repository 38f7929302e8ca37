//! End-to-end tests through the `Nodwatch` handle
//!
//! - `search_flow`: commits, rollbacks and index failures as seen by callers
//! - `facades`: posts, waypoints, tasks and notifications together
//! - `config_files`: opening from a data directory
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test end_to_end
//! ```

mod test_utils;

mod config_files;
mod facades;
mod search_flow;
