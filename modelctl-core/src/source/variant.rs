//! The enumerated set of repository-variant tags recognized in source strings.

/// A repository sub-layout tag (e.g. `fp16`) selecting which file set to
/// download. The set is authoritative for matching the source grammar - an
/// unrecognized tag after a `:` falls through to a different source kind
/// rather than being accepted as a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoVariant {
    Fp16,
    Fp32,
    Onnx,
    Openvino,
    Default,
}

impl RepoVariant {
    /// All recognized tags, lowercase, in the order tried when matching.
    pub const ALL: &'static [(&'static str, RepoVariant)] = &[
        ("fp16", RepoVariant::Fp16),
        ("fp32", RepoVariant::Fp32),
        ("onnx", RepoVariant::Onnx),
        ("openvino", RepoVariant::Openvino),
        ("default", RepoVariant::Default),
    ];

    pub fn parse(tag: &str) -> Option<RepoVariant> {
        let lower = tag.to_ascii_lowercase();
        Self::ALL
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, v)| *v)
    }

    /// The regex alternation fragment used by the source-string grammar,
    /// e.g. `"fp16|fp32|onnx|openvino|default"`.
    pub fn regex_alternation() -> String {
        Self::ALL
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepoVariant::Fp16 => "fp16",
            RepoVariant::Fp32 => "fp32",
            RepoVariant::Onnx => "onnx",
            RepoVariant::Openvino => "openvino",
            RepoVariant::Default => "default",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(RepoVariant::parse("FP16"), Some(RepoVariant::Fp16));
        assert_eq!(RepoVariant::parse("OpenVINO"), Some(RepoVariant::Openvino));
    }

    #[test]
    fn parse_rejects_unknown_tag() {
        assert_eq!(RepoVariant::parse("bf16"), None);
    }

    #[test]
    fn regex_alternation_contains_every_variant() {
        let alt = RepoVariant::regex_alternation();
        for (name, _) in RepoVariant::ALL {
            assert!(alt.contains(name));
        }
    }
}
