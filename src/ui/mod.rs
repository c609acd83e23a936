pub mod dispatch_progress;
pub mod icons;
pub mod status;

pub use dispatch_progress::{DispatchUI, UiMode};
pub use status::{print_enforcement_status, print_phase_map, print_wave_plan};
