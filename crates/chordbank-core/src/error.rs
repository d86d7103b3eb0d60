use thiserror::Error;

/// Why a pitch name could not be turned into a frequency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PitchError {
    #[error("malformed pitch name {0:?}")]
    Malformed(String),
    #[error("unknown pitch class in {0:?}")]
    UnknownPitchClass(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressionError {
    #[error("progression {0:?} has no bars")]
    Empty(&'static str),
    #[error("progression {name:?} bar {bar} has an empty sub-chord list")]
    EmptySplit { name: &'static str, bar: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("failed to arm timer: {0}")]
    Arm(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is already playing")]
    AlreadyPlaying,
    #[error(transparent)]
    Timer(#[from] TimerError),
}
