mod deploy;
mod finalise;
mod render;
mod report;
mod scan;

pub use deploy::{DeployOptions, cmd_deploy};
pub use finalise::cmd_finalise;
pub use render::cmd_render;
pub use scan::cmd_scan;
