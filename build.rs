use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");

    if let Some(dir) = env::var_os("FFMPEG_DIR").map(PathBuf::from) {
        if !dir.join("include").exists() {
            println!(
                "cargo:warning=FFMPEG_DIR={} has no include/ directory; FFmpeg headers will not be found there.",
                dir.display()
            );
        }
        return;
    }

    // pkg-config finds FFmpeg on Unix; Windows builds usually go through vcpkg.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    let candidate = env::var_os("VCPKG_ROOT")
        .map(|root| PathBuf::from(root).join("installed").join("x64-windows"));
    match candidate {
        Some(dir) if dir.exists() => println!(
            "cargo:warning=FFMPEG_DIR is not set; vcpkg FFmpeg found at {}, set FFMPEG_DIR to it.",
            dir.display()
        ),
        _ => println!(
            "cargo:warning=FFMPEG_DIR is not set; install FFmpeg (e.g. `vcpkg install ffmpeg:x64-windows`) and point FFMPEG_DIR at it."
        ),
    }
}
