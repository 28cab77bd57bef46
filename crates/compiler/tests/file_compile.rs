//! File-based compilation entry points.

use std::fs;

use sfc::{compile_state_machine_file, compile_state_vector_file};
use surefire_core::Error;

#[test]
fn test_compile_config_files() {
    let dir = tempfile::tempdir().unwrap();
    let sv_path = dir.path().join("vehicle.sv");
    let sm_path = dir.path().join("vehicle.sm");

    fs::write(
        &sv_path,
        "[Telemetry]\n\
         U64 time\n\
         U32 state\n\
         F64 altitude\n",
    )
    .unwrap();
    fs::write(
        &sm_path,
        "[STATE_VECTOR]\n\
         U64 time  @ALIAS G\n\
         U32 state @ALIAS S\n\
         F64 altitude\n\
         \n\
         [Ascent]\n\
         .STEP\n\
             altitude = altitude + 12.5\n",
    )
    .unwrap();

    let sv = compile_state_vector_file(&sv_path).unwrap();
    let mut asm = compile_state_machine_file(&sm_path, &sv).unwrap();

    asm.machine.step().unwrap();
    assert_eq!(sv.get_element::<f64>("altitude").unwrap().read(), 12.5);
}

#[test]
fn test_file_errors_carry_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let sv_path = dir.path().join("broken.sv");
    fs::write(&sv_path, "[Foo]\nI33 a\n").unwrap();

    let err = compile_state_vector_file(&sv_path).unwrap_err();
    assert_eq!(err.code(), Error::SvElemType);
    let rendered = err.to_string();
    assert!(rendered.contains("broken.sv"), "{}", rendered);
    assert!(rendered.contains("2:1"), "{}", rendered);
}

#[test]
fn test_missing_file() {
    let err = compile_state_vector_file(std::path::Path::new("/no/such/config.sv")).unwrap_err();
    assert_eq!(err.code(), Error::File);
}
