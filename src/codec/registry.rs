//! Static codec registry: factory descriptors plus tagged-variant dispatch,
//! per Design Notes §9's preference for a static registry over dynamic
//! plugin loading. A `CodecFactory` still carries everything `spec.md`
//! §4.2's plugin descriptor does (name, name-matching regex, block length,
//! AVT payload types) so that contract is unchanged; only the loading
//! mechanism is simplified.

use super::error::CodecError;
use super::{Codec, gsm::GsmCodec, pcma::PcmaCodec, pcmu::PcmuCodec};
use regex::{Regex, RegexBuilder};

/// Which built-in codec a factory produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Pcmu,
    Pcma,
    Gsm,
}

impl CodecKind {
    #[must_use]
    pub fn instantiate(self) -> Box<dyn Codec> {
        match self {
            Self::Pcmu => Box::new(PcmuCodec::new()),
            Self::Pcma => Box::new(PcmaCodec::new()),
            Self::Gsm => Box::new(GsmCodec::new()),
        }
    }
}

/// Static description of an in-tree codec, matching `spec.md` §4.2's
/// factory descriptor shape.
pub struct CodecFactory {
    pub name: &'static str,
    pub name_regex: Regex,
    pub block_len: usize,
    pub payload_types: Vec<u8>,
    pub kind: CodecKind,
}

impl CodecFactory {
    fn new(name: &'static str, block_len: usize, payload_types: Vec<u8>, kind: CodecKind) -> Self {
        let pattern = format!("^{name}$");
        let name_regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .expect("static codec name patterns are valid regexes");
        Self {
            name,
            name_regex,
            block_len,
            payload_types,
            kind,
        }
    }

    #[must_use]
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.name_regex.is_match(candidate)
    }

    #[must_use]
    pub fn matches_avt(&self, pt: u8) -> bool {
        self.payload_types.contains(&pt)
    }
}

/// Holds every codec factory this engine knows about and instantiates
/// codec instances on demand (e.g. when an RTP channel sees a new payload
/// type on the wire, per `spec.md` §4.3.2).
pub struct CodecRegistry {
    factories: Vec<CodecFactory>,
}

impl CodecRegistry {
    /// Registry carrying the three codecs `spec.md` §2 requires.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            factories: vec![
                CodecFactory::new("PCMU", super::pcmu::BLOCK_LEN_BYTES, vec![super::pcmu::PAYLOAD_TYPE], CodecKind::Pcmu),
                CodecFactory::new("PCMA", super::pcma::BLOCK_LEN_BYTES, vec![super::pcma::PAYLOAD_TYPE], CodecKind::Pcma),
                CodecFactory::new("GSM", super::gsm::BLOCK_LEN_BYTES, vec![super::gsm::PAYLOAD_TYPE], CodecKind::Gsm),
            ],
        }
    }

    #[must_use]
    pub fn find_by_avt(&self, pt: u8) -> Option<&CodecFactory> {
        self.factories.iter().find(|f| f.matches_avt(pt))
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&CodecFactory> {
        self.factories.iter().find(|f| f.matches_name(name))
    }

    /// Create and start a codec instance for the given payload type.
    pub fn instantiate_for_avt(&self, pt: u8) -> Result<Box<dyn Codec>, CodecError> {
        let factory = self.find_by_avt(pt).ok_or(CodecError::NoMatchingFactory)?;
        let mut codec = factory.kind.instantiate();
        if !codec.start() {
            return Err(CodecError::NotStarted);
        }
        Ok(codec)
    }

    /// Create and start a codec instance matched by SDP `rtpmap` name.
    pub fn instantiate_for_name(&self, name: &str) -> Result<Box<dyn Codec>, CodecError> {
        let factory = self.find_by_name(name).ok_or(CodecError::NoMatchingFactory)?;
        let mut codec = factory.kind.instantiate();
        if !codec.start() {
            return Err(CodecError::NotStarted);
        }
        Ok(codec)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn static_payload_types_match_spec() {
        let reg = CodecRegistry::with_defaults();
        assert_eq!(reg.find_by_avt(0).unwrap().name, "PCMU");
        assert_eq!(reg.find_by_avt(8).unwrap().name, "PCMA");
        assert_eq!(reg.find_by_avt(3).unwrap().name, "GSM");
        assert!(reg.find_by_avt(101).is_none());
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let reg = CodecRegistry::with_defaults();
        assert!(reg.find_by_name("pcmu").is_some());
        assert!(reg.find_by_name("GsM").is_some());
        assert!(reg.find_by_name("opus").is_none());
    }

    #[test]
    fn instantiate_starts_the_codec() {
        let reg = CodecRegistry::with_defaults();
        let codec = reg.instantiate_for_avt(0).unwrap();
        assert_eq!(codec.name(), "PCMU");
        assert_eq!(codec.block_len(), super::super::pcmu::BLOCK_LEN_BYTES);
    }
}
