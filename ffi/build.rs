//! Generates `include/oerp.h` from the `extern "C"` surface.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");

    let Ok(crate_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let include_dir = PathBuf::from(&crate_dir).join("include");
    if let Err(e) = std::fs::create_dir_all(&include_dir) {
        println!("cargo:warning=cannot create {}: {e}", include_dir.display());
        return;
    }

    let generated = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("OERP_H")
        .with_cpp_compat(true)
        .generate();
    match generated {
        Ok(bindings) => {
            bindings.write_to_file(include_dir.join("oerp.h"));
        }
        Err(e) => println!("cargo:warning=cbindgen failed: {e}"),
    }
}
