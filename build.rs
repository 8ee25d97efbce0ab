fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_file = "proto/file_transfer.proto";
    let proto_dir = "proto";

    println!("cargo:rerun-if-changed={}", proto_file);

    // SAFETY: build scripts are single threaded.
    unsafe {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&[proto_file], &[proto_dir])?;

    Ok(())
}
