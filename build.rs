// Build script for the flutter_rust_bridge surface
//
// Dart bindings are generated out of band by the codegen CLI:
//   flutter_rust_bridge_codegen generate
// This script only tracks the api module and fixes Android linking.

fn main() {
    // Rerun when the FFI surface changes
    println!("cargo:rerun-if-changed=src/api.rs");

    // Oboe is C++; Android builds link against libc++_shared so symbols like
    // __cxa_pure_virtual resolve on every ABI.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("android") {
        println!("cargo:rustc-link-lib=c++_shared");
    }
}
