use std::env;
use std::path::PathBuf;

use protobuf::Message;

const PROTO_DIR: &str = "proto";

const PROTOS: [&str; 5] = [
    "proto/windowmanagertrace.proto",
    "proto/layerstrace.proto",
    "proto/waylandtrace.proto",
    "proto/trace.proto",
    "proto/protolog.proto",
];

fn main() {
    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR must be set in build script"));

    let descriptor_set = protobuf_parse::Parser::new()
        .pure()
        .include(PROTO_DIR)
        .inputs(PROTOS)
        .file_descriptor_set()
        .expect("Failed to parse trace schemas");

    let bytes = descriptor_set
        .write_to_bytes()
        .expect("Failed to serialize trace schemas");
    std::fs::write(out_dir.join("trace_schemas.pb"), bytes)
        .expect("Failed to write trace_schemas.pb");

    for proto in PROTOS {
        println!("cargo:rerun-if-changed={}", proto);
    }
}
