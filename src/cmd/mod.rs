//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `waves`    | `Waves`          |
//! | `simulate` | `Simulate`       |
//! | `phase`    | `Phases`         |
//! | `config`   | `Config`         |

pub mod config;
pub mod phase;
pub mod simulate;
pub mod waves;

pub use config::cmd_config;
pub use phase::cmd_phases;
pub use simulate::{SimulateOptions, cmd_simulate, parse_task_list};
pub use waves::cmd_waves;
