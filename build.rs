// Hexagon Watch - Build Script
//
// Emits the ESP-IDF link environment and version info.

use std::process::Command;

fn main() {
    // ESP-IDF environment setup (MUST be first!)
    // Host builds (tests) have no ESP-IDF environment to forward.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }

    // Track sdkconfig changes (Bluedroid + Wi-Fi coexistence)
    println!("cargo:rerun-if-changed=sdkconfig.defaults");

    // Get git version info
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=VERSION_STRING=HexagonWatch v{}-g{}", version, git_hash);

    // Build-time configuration overrides (see src/config.rs)
    for key in ["WIFI_SSID", "WIFI_PASS", "MQTT_BROKER_URI", "MQTT_TOPIC"] {
        println!("cargo:rerun-if-env-changed={}", key);
    }

    // Rebuild if git HEAD changes
    println!("cargo:rerun-if-changed=.git/HEAD");
}
