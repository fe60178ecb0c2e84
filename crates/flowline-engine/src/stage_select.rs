//! Stage-selection response contract: `"<stage_name>[, confidence: <float>]"`,
//! case-insensitive and tolerant of surrounding text. A convention rather
//! than a strict schema — a JSON contract would be more robust, but this
//! matches the format stage-selection templates are written to produce.

use once_cell::sync::Lazy;
use regex::Regex;

static CONFIDENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)confidence\s*:\s*([0-9]*\.?[0-9]+)").expect("valid confidence regex"));

/// Canonicalizes a stage name for comparison: trim + lowercase.
pub fn canonicalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parses the raw LLM text into `(stage_name, confidence)`. The stage name
/// is everything before a `,` (or the whole trimmed text if there's no
/// comma); confidence is extracted from anywhere in the text if present.
pub fn parse(raw: &str) -> (String, Option<f64>) {
    let confidence = CONFIDENCE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    let name_part = raw.split(',').next().unwrap_or(raw).trim();
    (name_part.to_string(), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_confidence() {
        let (name, confidence) = parse("Checkout, confidence: 0.9");
        assert_eq!(name, "Checkout");
        assert_eq!(confidence, Some(0.9));
    }

    #[test]
    fn parses_name_only() {
        let (name, confidence) = parse("Checkout");
        assert_eq!(name, "Checkout");
        assert_eq!(confidence, None);
    }

    #[test]
    fn tolerant_of_surrounding_text() {
        let (name, confidence) = parse("The best stage is: Checkout, confidence: 0.75 (high)");
        assert_eq!(name, "The best stage is: Checkout");
        assert_eq!(confidence, Some(0.75));
    }

    #[test]
    fn canonicalize_trims_and_lowercases() {
        assert_eq!(canonicalize("  Checkout \n"), "checkout");
    }
}
