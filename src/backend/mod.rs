//! Output staging. The textual IR is written next to the input file; object
//! code is produced by handing that file to the platform's LLVM toolchain,
//! which owns target selection and machine-code emission.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} failed:\n{stderr}")]
    Toolchain { command: String, stderr: String },
}

/// Writes the IR text next to the input, replacing its extension with `.ll`
pub fn write_ir_file(input: &Path, ir: &str) -> Result<PathBuf, BackendError> {
    let path = input.with_extension("ll");

    std::fs::write(&path, ir).map_err(|source| BackendError::Write {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

fn create_object_command(input_file: &Path, output_file: &Path, opt_level: u8) -> Command {
    let mut cmd = Command::new("clang");

    cmd.arg("-c")
        .arg(format!("-O{opt_level}"))
        .arg("-Wno-override-module")
        .arg(input_file)
        .arg("-o")
        .arg(output_file);

    cmd
}

/// Compiles the written `.ll` to a native object file with extension `.o`.
/// The intermediate `.ll` is removed unless the caller asked to keep it.
pub fn write_object_file(
    input: &Path,
    ir: &str,
    opt_level: u8,
    keep_ir: bool,
) -> Result<PathBuf, BackendError> {
    let ir_path = write_ir_file(input, ir)?;
    let object_path = input.with_extension("o");

    let mut cmd = create_object_command(&ir_path, &object_path, opt_level);
    let output = cmd.output().map_err(|source| BackendError::Spawn {
        command: "clang".to_string(),
        source,
    });

    if !keep_ir {
        let _ = std::fs::remove_file(&ir_path);
    }

    let output = output?;

    if !output.status.success() {
        return Err(BackendError::Toolchain {
            command: "clang".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(object_path)
}
