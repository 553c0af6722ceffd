fn main() {
    // Exposed to the CLI's long version string.
    let version = match rustc_version::version() {
        Ok(v) => v.to_string(),
        Err(e) => {
            println!("cargo:warning=unable to determine rustc version: {e}");
            "unknown".to_owned()
        }
    };
    println!("cargo:rustc-env=RUSTC_VERSION={version}");
    println!("cargo:rerun-if-changed=build.rs");
}
