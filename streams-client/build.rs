// SPDX-License-Identifier: Apache-2.0

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var(
        "PROTOC",
        protoc_bin_vendored::protoc_bin_path().expect("vendored protoc binary"),
    );
    // The server stub is only driven in tests (a fake server scripts the
    // exact sequences the receiver/sender have to handle) but tonic-build
    // needs to run once for both; gating it on a feature would just mean
    // maintaining two build graphs for no real savings.
    tonic_build::configure()
        .build_server(true)
        .compile_protos(&["proto/packets.proto"], &["proto"])?;
    Ok(())
}
