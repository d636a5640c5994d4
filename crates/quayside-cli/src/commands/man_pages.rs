use super::EXIT_SUCCESS;
use clap::{Command, CommandFactory};
use std::path::Path;

fn render(cmd: Command, dir: &Path, page: &str) -> Result<(), String> {
    let mut buf = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buf)
        .map_err(|e| format!("man page render failed: {e}"))?;
    let path = dir.join(format!("{page}.1"));
    std::fs::write(&path, &buf).map_err(|e| format!("failed to write {}: {e}", path.display()))
}

/// One page for the binary and one per subcommand, nested subcommands
/// included (`quayside-domain-add.1`).
fn render_tree(cmd: &Command, dir: &Path, page: &str) -> Result<(), String> {
    render(cmd.clone(), dir, page)?;
    for sub in cmd.get_subcommands() {
        render_tree(sub, dir, &format!("{page}-{}", sub.get_name()))?;
    }
    Ok(())
}

pub fn run<C: CommandFactory>(dir: &Path) -> Result<u8, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("failed to create dir: {e}"))?;
    let cmd = C::command();
    let name = cmd.get_name().to_owned();
    render_tree(&cmd, dir, &name)?;
    println!("man pages written to {}", dir.display());
    Ok(EXIT_SUCCESS)
}
