//! Build script for proto compilation.
//!
//! The generated code is committed to the repository, so this only needs
//! to run when the Pulumi provider protocol subset in `proto/` changes.
//!
//! To regenerate: `cargo build --features regenerate-proto`
//!
//! The generated file will be placed in `src/generated.rs`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "regenerate-proto")]
    {
        let out_dir = std::path::PathBuf::from("src");
        tonic_prost_build::configure()
            .build_client(false)
            .out_dir(&out_dir)
            .compile_protos(&["proto/provider.proto"], &["proto"])?;

        let generated = out_dir.join("pulumirpc.rs");
        let target = out_dir.join("generated.rs");
        if generated.exists() {
            std::fs::rename(generated, target)?;
        }
    }

    println!("cargo:rerun-if-changed=proto/provider.proto");

    Ok(())
}
