#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod logging;
pub mod mock_lifetime;

pub use assertions::{assert_artifact, assert_called, assert_not_called};
pub use fixtures::{Workspace, fast_config, trigger_manifest};
pub use logging::init_test_logging;
pub use mock_lifetime::MockLifetime;
