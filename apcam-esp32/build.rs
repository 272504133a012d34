use std::env;
use std::path::PathBuf;

fn main() {
    // Necessary because of this issue: https://github.com/rust-lang/cargo/issues/9641
    embuild::espidf::sysenv::output();

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
    let config_path = PathBuf::from(manifest_dir).join("cfg.toml");
    if !config_path.exists() {
        println!(
            "cargo:warning=cfg.toml not found, building with defaults (open AP \"T-CameraPlus\"). \
             Copy cfg.toml.example to cfg.toml to customize."
        );
    }

    println!("cargo:rerun-if-changed=cfg.toml");
}
