use anyhow::Result;
use std::fs;
use std::process::Command;

fn tiletune() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tiletune"))
}

#[test]
fn unknown_dimension_exits_with_one() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let scratch = dir.path().join("scratch");

    let output = tiletune()
        .args(["tile-search", "4", "missing.cu", "sm_20", "--scratch-dir"])
        .arg(&scratch)
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Unknown dimensionality!"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
    assert!(!scratch.exists());
    Ok(())
}

#[test]
fn template_without_placeholder_exits_with_one() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let template = dir.path().join("jacobi.cu");
    fs::write(&template, "void step() {}\n")?;

    let output = tiletune()
        .arg("tile-search")
        .arg("2")
        .arg(&template)
        .arg("sm_20")
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("TILE_SIZE_PARAMS"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn space_counts_builtin_profiles() -> Result<()> {
    let output = tiletune().args(["space", "tile", "2"]).output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("x = 32:128:32"));
    assert!(stdout.contains("Num Configs: 864"));

    let output = tiletune().args(["space", "tile", "3"]).output()?;
    assert!(String::from_utf8(output.stdout)?.contains("Num Configs: 729"));

    let output = tiletune()
        .args(["space", "cpu", "2", "--range", "t=1:2", "--list"])
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Num Configs: 128"));
    assert!(stdout.contains("0: [1, 4, 4]"));
    assert!(stdout.contains("127: [2, 32, 32]"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn tile_search_routes_rows_and_writes_report() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir()?;
    let template = dir.path().join("jacobi.cu");
    fs::write(&template, "#pragma overtile TILE_SIZE_PARAMS\n")?;

    let nvcc = dir.path().join("nvcc");
    fs::write(
        &nvcc,
        "#!/bin/sh\n\
         printf '#!/bin/sh\\necho \"CPU Elapsed: 0.5\"\\necho \"Elapsed: 0.4\"\\n\
         echo \"GStencils/sec: %s\"\\n' \"$3\" > \"$2\"\n\
         chmod +x \"$2\"\n",
    )?;
    fs::set_permissions(&nvcc, fs::Permissions::from_mode(0o755))?;
    let report = dir.path().join("report.json");

    let output = tiletune()
        .arg("tile-search")
        .arg("2")
        .arg(&template)
        .arg("sm_20")
        .args(["--translator", "cp {input} {output}"])
        .arg("--compiler")
        .arg(format!("{} {{input}} {{output}} {{problem_size}}", nvcc.display()))
        .args(["--range", "x=32", "--range", "y=4", "--range", "t=1:2", "--range", "ey=1"])
        .arg("--scratch-dir")
        .arg(dir.path().join("scratch"))
        .arg("--report")
        .arg(&report)
        .env("RUST_LOG", "warn")
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "x,y,z,t,ex,ey,ez,gstencils,cpu_elapsed,compute_elapsed,",
            "32,4,1,1,1,1,1,6000.000000,0.500000,0.400000,",
            "32,4,1,2,1,1,1,6000.000000,0.500000,0.400000,",
        ]
    );
    assert!(stderr.contains("Num Configs: 2"));
    assert!(stderr.contains("Max Compute GStencils/sec: 90.000000"));

    let saved: serde_json::Value = serde_json::from_slice(&fs::read(&report)?)?;
    assert_eq!(saved["cancelled"], serde_json::Value::Bool(false));
    assert_eq!(saved["results"].as_array().map(Vec::len), Some(2));
    Ok(())
}
