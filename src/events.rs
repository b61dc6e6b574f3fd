use std::fmt;
use std::path::PathBuf;

/// Which folder an image was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Logo,
    Pictures,
    Uploaded,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Logo => "logo",
            Self::Pictures => "pictures",
            Self::Uploaded => "uploaded",
        })
    }
}

/// Observable effects of the rotation engine, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Rescanned { logos: usize, pictures: usize },
    /// Transition finished and the hold period completed (or was cut short by a stop).
    Shown { source: Source, path: PathBuf },
    /// The file could not be decoded; nothing was displayed.
    Skipped { source: Source, path: PathBuf },
    Retired { from: PathBuf, to: PathBuf },
    RetireFailed { path: PathBuf },
    EmptyWait,
    Stopped,
}
