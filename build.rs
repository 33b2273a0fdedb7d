fn main() {
    // Local ONNX Runtime unpacked next to the crate, if present
    let ort_dir = std::env::var("ORT_LIB_DIR")
        .unwrap_or_else(|_| "onnxruntime-linux-x64-1.22.0/lib".to_string());
    if std::path::Path::new(&ort_dir).exists() {
        println!("cargo:rustc-link-search=native={}", ort_dir);
    }

    println!("cargo:rerun-if-env-changed=ORT_LIB_DIR");
    println!("cargo:rerun-if-changed=onnxruntime-linux-x64-1.22.0/");
}
