//! TIFF code translators
//!
//! Translate numeric TIFF field values that the structural report shows
//! by name. Compression and photometric names live in `tag_utils`.

use crate::tiff::constants::{planar_config, predictor, sample_format};

/// Converts a TIFF sample format code to its human-readable description
pub fn sample_format_code_to_name(sample_format_code: u64) -> &'static str {
    match sample_format_code {
        code if code == sample_format::UNSIGNED as u64 => "Unsigned integer",
        code if code == sample_format::SIGNED as u64 => "Signed integer",
        code if code == sample_format::IEEEFP as u64 => "IEEE floating point",
        code if code == sample_format::VOID as u64 => "Undefined",
        code if code == sample_format::COMPLEX_INT as u64 => "Complex integer",
        code if code == sample_format::COMPLEX_IEEEFP as u64 => "Complex floating point",
        _ => "Unknown",
    }
}

/// Converts a TIFF predictor code to its human-readable description
pub fn predictor_code_to_name(predictor_code: u64) -> &'static str {
    match predictor_code {
        code if code == predictor::NONE as u64 => "None",
        code if code == predictor::HORIZONTAL_DIFFERENCING as u64 => "Horizontal differencing",
        code if code == predictor::FLOATING_POINT as u64 => "Floating point predictor",
        _ => "Unknown",
    }
}

/// Converts a TIFF planar configuration code to its human-readable description
pub fn planar_config_code_to_name(planar_config_code: u64) -> &'static str {
    match planar_config_code {
        code if code == planar_config::CHUNKY as u64 => "Chunky (interleaved)",
        code if code == planar_config::PLANAR as u64 => "Planar (separate)",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_codes() {
        assert_eq!(predictor_code_to_name(2), "Horizontal differencing");
        assert_eq!(sample_format_code_to_name(3), "IEEE floating point");
        assert_eq!(planar_config_code_to_name(2), "Planar (separate)");
        assert_eq!(predictor_code_to_name(9), "Unknown");
    }
}
