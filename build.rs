//! Build script: embeds the git hash and verifies GPU toolkits are present
//! before whisper-rs-sys starts a long native build against a missing SDK.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    // (enabled, probe command, probe args, toolkit, install url)
    let toolkits = [
        (
            cfg!(feature = "cuda"),
            "nvcc",
            &["--version"][..],
            "CUDA toolkit",
            "https://developer.nvidia.com/cuda-downloads",
        ),
        (
            cfg!(feature = "vulkan"),
            "vulkaninfo",
            &["--summary"][..],
            "Vulkan SDK",
            "https://vulkan.lunarg.com/",
        ),
        (
            cfg!(feature = "hipblas"),
            "rocminfo",
            &[][..],
            "ROCm",
            "https://rocm.docs.amd.com/",
        ),
    ];

    for (enabled, probe, args, toolkit, url) in toolkits {
        if enabled && !tool_exists(probe, args) {
            panic!(
                "`{probe}` not found: {toolkit} is not installed.\n\
                 Install it from {url}\n\
                 or build without it: cargo build --release"
            );
        }
    }

    if cfg!(feature = "openblas") && !openblas_exists() {
        panic!(
            "OpenBLAS not found.\n\
             Install it: sudo apt install libopenblas-dev\n\
             or build without it: cargo build --release"
        );
    }
}

fn tool_exists(name: &str, args: &[&str]) -> bool {
    Command::new(name).args(args).output().is_ok()
}

/// OpenBLAS ships as a library, not a tool; ask pkg-config, then fall back
/// to the usual shared-object locations.
fn openblas_exists() -> bool {
    let pkg_config_ok = Command::new("pkg-config")
        .args(["--exists", "openblas"])
        .status()
        .is_ok_and(|s| s.success());

    pkg_config_ok
        || std::path::Path::new("/usr/lib/x86_64-linux-gnu/libopenblas.so").exists()
        || std::path::Path::new("/usr/lib/libopenblas.so").exists()
        || std::path::Path::new("/usr/lib64/libopenblas.so").exists()
}
