fn main() {
    // Worker-side services first, then the controller's lifecycle service.
    let protos = vec![
        "proto/player.proto",
        "proto/search.proto",
        "proto/health.proto",
        "proto/worker_lifecycle.proto",
    ];

    for proto in &protos {
        println!("cargo:rerun-if-changed={}", proto);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&protos, &["proto"])
        .unwrap();
}
