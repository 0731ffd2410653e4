//! The `kiln clean` command.

use crate::pipeline::open;
use crate::GlobalArgs;

/// Runs the `kiln clean` command, deleting every target's incremental cache.
///
/// Outputs are left in place; the next build is a full rebuild.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut project = open(global)?;
    project.session.clean()?;
    if !global.quiet {
        eprintln!(
            "   Cleaned {} target cache(s) of {}",
            project.session.targets().count(),
            project.name
        );
    }
    Ok(0)
}
