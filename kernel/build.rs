fn main() {
    // Region placement for the shared mailbox and the sandbox image
    println!("cargo:rerun-if-changed=warden.ld");

    // Board linker scripts INCLUDE warden.ld; only riscv32 images link it
    if std::env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("riscv32") {
        if let Ok(dir) = std::env::var("CARGO_MANIFEST_DIR") {
            println!("cargo:rustc-link-search={}", dir);
        }
    }
}
