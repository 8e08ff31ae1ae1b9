//! Parses a free-form source string into a typed `Source`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::RemoteApiToken;
use crate::error::{InstallError, Result};

use super::types::Source;
use super::variant::RepoVariant;

fn repo_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let variants = RepoVariant::regex_alternation();
        let pattern = format!(r"^([^/:]+/[^/:]+)(?::({variants})?(?::/?([^:]+))?)?$");
        Regex::new(&pattern).expect("repo source regex is valid")
    })
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[^/]+").expect("url source regex is valid"))
}

/// Classifies `source`: existing filesystem entry, repo-id
/// grammar, then `http(s)://` URL, in that order. `exists` is injected so
/// tests do not need to touch the real filesystem.
pub fn parse_source(
    source: &str,
    access_token: Option<String>,
    inplace: bool,
    remote_api_tokens: &[RemoteApiToken],
    exists: impl Fn(&Path) -> bool,
) -> Result<Source> {
    let path = PathBuf::from(source);
    if exists(&path) {
        return Ok(Source::Local { path, inplace });
    }

    if let Some(caps) = repo_regex().captures(source) {
        let repo_id = caps.get(1).unwrap().as_str().to_string();
        let variant = caps
            .get(2)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .and_then(RepoVariant::parse);
        let subfolder = caps
            .get(3)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        return Ok(Source::Repo {
            repo_id,
            variant,
            subfolder,
            access_token,
        });
    }

    if url_regex().is_match(source) {
        let token = access_token.or_else(|| {
            remote_api_tokens.iter().find_map(|pair| {
                Regex::new(&pair.url_regex)
                    .ok()
                    .filter(|re| re.is_match(source))
                    .map(|_| pair.token.clone())
            })
        });
        return Ok(Source::Url {
            url: source.to_string(),
            access_token: token,
        });
    }

    Err(InstallError::BadSource(source.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_exists(_: &Path) -> bool {
        false
    }

    #[test]
    fn plain_repo_id() {
        let s = parse_source("a/b", None, false, &[], never_exists).unwrap();
        assert_eq!(
            s,
            Source::Repo {
                repo_id: "a/b".into(),
                variant: None,
                subfolder: None,
                access_token: None,
            }
        );
    }

    #[test]
    fn repo_id_with_variant() {
        let s = parse_source("a/b:fp16", None, false, &[], never_exists).unwrap();
        assert_eq!(
            s,
            Source::Repo {
                repo_id: "a/b".into(),
                variant: Some(RepoVariant::Fp16),
                subfolder: None,
                access_token: None,
            }
        );
    }

    #[test]
    fn repo_id_with_variant_and_subfolder() {
        let s = parse_source("a/b:fp16:/sub/dir", None, false, &[], never_exists).unwrap();
        assert_eq!(
            s,
            Source::Repo {
                repo_id: "a/b".into(),
                variant: Some(RepoVariant::Fp16),
                subfolder: Some(PathBuf::from("sub/dir")),
                access_token: None,
            }
        );
    }

    #[test]
    fn repo_id_with_empty_variant_and_subfolder() {
        let s = parse_source("a/b::sub", None, false, &[], never_exists).unwrap();
        assert_eq!(
            s,
            Source::Repo {
                repo_id: "a/b".into(),
                variant: None,
                subfolder: Some(PathBuf::from("sub")),
                access_token: None,
            }
        );
    }

    #[test]
    fn huggingface_bare_url() {
        let s = parse_source(
            "https://huggingface.co/a/b",
            None,
            false,
            &[],
            never_exists,
        )
        .unwrap();
        assert_eq!(
            s,
            Source::Url {
                url: "https://huggingface.co/a/b".into(),
                access_token: None,
            }
        );
    }

    #[test]
    fn url_picks_up_token_from_config() {
        let tokens = vec![RemoteApiToken {
            url_regex: r"^https://example\.com/".to_string(),
            token: "secret-token".to_string(),
        }];
        let s = parse_source("https://example.com/m.bin", None, false, &tokens, never_exists)
            .unwrap();
        match s {
            Source::Url { access_token, .. } => {
                assert_eq!(access_token.as_deref(), Some("secret-token"));
            }
            _ => panic!("expected Url source"),
        }
    }

    #[test]
    fn explicit_token_wins_over_config() {
        let tokens = vec![RemoteApiToken {
            url_regex: r"^https://example\.com/".to_string(),
            token: "config-token".to_string(),
        }];
        let s = parse_source(
            "https://example.com/m.bin",
            Some("explicit".to_string()),
            false,
            &tokens,
            never_exists,
        )
        .unwrap();
        match s {
            Source::Url { access_token, .. } => {
                assert_eq!(access_token.as_deref(), Some("explicit"));
            }
            _ => panic!("expected Url source"),
        }
    }

    #[test]
    fn local_path_wins_when_it_exists() {
        let s = parse_source("/abs/local/file", None, true, &[], |_| true).unwrap();
        assert_eq!(
            s,
            Source::Local {
                path: PathBuf::from("/abs/local/file"),
                inplace: true,
            }
        );
    }

    #[test]
    fn unrecognized_source_is_bad_source() {
        let err = parse_source("not a valid:::source", None, false, &[], never_exists)
            .unwrap_err();
        assert!(matches!(err, InstallError::BadSource(_)));
    }
}
