//! Module loading: sniff `.wasm` vs `.wat`, convert text to binary, compile.
//!
//! Front ends hand over raw bytes, and file extensions are not always available (or honest),
//! so the bytes themselves decide the format.

use thiserror::Error;
use wasmtime::{Engine, Module};

#[derive(Debug, Error)]
pub enum LoadError {
    /// The input was empty or otherwise not recognized as WASM/WAT.
    #[error("unrecognized module format (expected wasm or wat)")]
    UnrecognizedFormat,
    #[error("failed to parse WAT: {0}")]
    WatParseFailed(#[from] wat::Error),
    #[error("failed to compile wasm module: {0:#}")]
    CompileFailed(wasmtime::Error),
}

/// What kind of module the loader inferred from the bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DetectedFormat {
    Wasm,
    Wat,
}

/// Result of normalizing (detecting + possibly converting) the input.
#[derive(Clone, Debug)]
pub struct Detected {
    pub format: DetectedFormat,
    /// Always valid WASM bytes (for WASM/WAT inputs).
    pub wasm_bytes: Vec<u8>,
}

/// Detect, convert if needed, compile.
pub fn compile_module(engine: &Engine, bytes: &[u8]) -> Result<Module, LoadError> {
    let Detected { format, wasm_bytes } = normalize_to_wasm(bytes)?;
    tracing::debug!(?format, len = wasm_bytes.len(), "compiling guest module");
    Module::new(engine, &wasm_bytes).map_err(LoadError::CompileFailed)
}

/// Detect format and normalize to WASM bytes.
pub fn normalize_to_wasm(bytes: &[u8]) -> Result<Detected, LoadError> {
    match detect_format(bytes).ok_or(LoadError::UnrecognizedFormat)? {
        DetectedFormat::Wasm => Ok(Detected {
            format: DetectedFormat::Wasm,
            wasm_bytes: bytes.to_vec(),
        }),
        DetectedFormat::Wat => Ok(Detected {
            format: DetectedFormat::Wat,
            wasm_bytes: wat::parse_bytes(bytes)?.into_owned(),
        }),
    }
}

/// `\0asm` magic means WASM; a `(` after an optional UTF-8 BOM and whitespace means WAT.
pub fn detect_format(bytes: &[u8]) -> Option<DetectedFormat> {
    if bytes.starts_with(b"\0asm") {
        return Some(DetectedFormat::Wasm);
    }

    let text = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    text.iter()
        .find(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .filter(|&&b| b == b'(')
        .map(|_| DetectedFormat::Wat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wasm_magic() {
        assert_eq!(
            detect_format(b"\0asm\x01\x00\x00\x00"),
            Some(DetectedFormat::Wasm)
        );
    }

    #[test]
    fn detects_wat_with_whitespace_and_bom() {
        assert_eq!(detect_format(b"   \n\t(module)"), Some(DetectedFormat::Wat));
        assert_eq!(
            detect_format(b"\xEF\xBB\xBF(module)"),
            Some(DetectedFormat::Wat)
        );
    }

    #[test]
    fn unrecognized_returns_none() {
        assert_eq!(detect_format(b"not wasm"), None);
        assert_eq!(detect_format(b""), None);
        assert!(matches!(
            normalize_to_wasm(b"  "),
            Err(LoadError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn wat_becomes_wasm() {
        let detected = normalize_to_wasm(b"(module)").unwrap();
        assert_eq!(detected.format, DetectedFormat::Wat);
        assert!(detected.wasm_bytes.starts_with(b"\0asm"));
    }

    #[test]
    fn bad_wat_is_a_parse_error() {
        assert!(matches!(
            normalize_to_wasm(b"(module (func $f (result i32)))))"),
            Err(LoadError::WatParseFailed(_))
        ));
    }

    #[test]
    fn compiles_with_engine() {
        let engine = Engine::default();
        assert!(compile_module(&engine, b"(module (memory (export \"memory\") 1))").is_ok());
    }
}
