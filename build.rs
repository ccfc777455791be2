//! Installs the repository's git hooks on local builds.
fn main() {
    println!("cargo:rerun-if-changed=.githooks");
    println!("cargo:rerun-if-env-changed=CI");
    if std::env::var_os("CI").is_some() {
        return;
    }
    rhusky::Rhusky::new()
        .hooks_dir(".githooks")
        .skip_in_env("GITHUB_ACTIONS")
        .install()
        .ok();
}
