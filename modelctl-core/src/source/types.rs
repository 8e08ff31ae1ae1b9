//! The three typed source variants a free-form source string resolves to.

use std::fmt;
use std::path::PathBuf;

use super::variant::RepoVariant;

/// A fully-resolved model source, as carried on an `InstallJob`.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Local {
        path: PathBuf,
        inplace: bool,
    },
    Repo {
        repo_id: String,
        variant: Option<RepoVariant>,
        subfolder: Option<PathBuf>,
        access_token: Option<String>,
    },
    Url {
        url: String,
        access_token: Option<String>,
    },
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local { path, .. } => write!(f, "{}", path.display()),
            Source::Repo {
                repo_id,
                variant,
                subfolder,
                ..
            } => {
                write!(f, "{repo_id}")?;
                if variant.is_some() || subfolder.is_some() {
                    write!(f, ":{}", variant.map(|v| v.as_str()).unwrap_or(""))?;
                }
                if let Some(sub) = subfolder {
                    write!(f, ":{}", sub.display())?;
                }
                Ok(())
            }
            Source::Url { url, .. } => write!(f, "{url}"),
        }
    }
}
