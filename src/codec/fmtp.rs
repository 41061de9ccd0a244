//! `fmtp` attribute tokenizing, per `spec.md` §6: values are split on `;`
//! or whitespace, a handful of resolution tokens are recognized and echoed
//! back in a normalized form so the caller can build an SDP answer.

/// Split an `fmtp` attribute value into individual tokens.
#[must_use]
pub fn split_tokens(value: &str) -> Vec<String> {
    value
        .split([';', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Recognize a resolution token (`QCIF`, `CIF`) and return the normalized
/// `name=value` form the source reflects back into the SDP answer.
#[must_use]
pub fn recognize_resolution(token: &str) -> Option<String> {
    match token.to_ascii_uppercase().as_str() {
        "QCIF" => Some("QCIF=2".to_string()),
        "CIF" => Some("CIF=2".to_string()),
        _ => None,
    }
}

/// Apply `addSetting`'s tokenizing + recognition rule to a full fmtp value,
/// returning the reconstructed fmtp string for the SDP answer.
#[must_use]
pub fn apply(value: &str) -> String {
    split_tokens(value)
        .iter()
        .filter_map(|tok| recognize_resolution(tok))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolon_and_space() {
        assert_eq!(split_tokens("QCIF;CIF foo"), vec!["QCIF", "CIF", "foo"]);
    }

    #[test]
    fn recognizes_qcif_and_cif_only() {
        assert_eq!(recognize_resolution("qcif"), Some("QCIF=2".to_string()));
        assert_eq!(recognize_resolution("CIF"), Some("CIF=2".to_string()));
        assert_eq!(recognize_resolution("annexb"), None);
    }

    #[test]
    fn apply_reconstructs_fmtp() {
        assert_eq!(apply("qcif;annexb cif"), "QCIF=2;CIF=2");
    }
}
