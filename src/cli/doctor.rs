//! Environment readiness check.

use crate::renderer::chromium::find_chromium;
use crate::setup;
use anyhow::Result;

/// Check Chromium availability and the pagesnap home directory.
pub async fn run() -> Result<()> {
    println!("Pagesnap Doctor");
    println!("===============");
    println!();

    // OS and architecture
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Check Chromium
    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set PAGESNAP_CHROMIUM_PATH."
        ),
    }

    // Check home directory
    let home = setup::home_dir();
    match std::fs::create_dir_all(&home) {
        Ok(()) => println!("[OK] Home directory writable: {}", home.display()),
        Err(e) => println!("[!!] Cannot create {}: {e}", home.display()),
    }

    // Readiness marker
    if home.join("ready").exists() {
        println!("[OK] Readiness marker present (bootstrap already ran)");
    } else {
        println!("[--] No readiness marker yet; first capture will probe the environment");
    }

    println!();
    if chromium_path.is_some() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
        println!("  Install Chrome/Chromium, then re-run `pagesnap doctor`.");
    }

    Ok(())
}
