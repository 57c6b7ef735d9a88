//! # Load State
//!
//! The three-valued readiness marker carried by every model and collection.
//!
//! A model starts in [`LoadState::Waiting`] when it has a pending fetch and moves to
//! [`LoadState::Loaded`] the first time its data is accessed. Models built from
//! pre-supplied data start (and stay) in [`LoadState::LoadedWithData`]. No
//! transition ever leaves `Loaded` or `LoadedWithData`.

use std::fmt;

/// Data readiness of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// A fetch is pending and has not been observed yet.
    Waiting,
    /// The lazy fetch completed and the data was populated.
    Loaded,
    /// The model was built from pre-supplied data and never fetched.
    LoadedWithData,
}

impl LoadState {
    pub const fn waiting() -> Self {
        LoadState::Waiting
    }

    pub const fn loaded() -> Self {
        LoadState::Loaded
    }

    pub const fn loaded_with_data() -> Self {
        LoadState::LoadedWithData
    }

    pub const fn is_waiting(self) -> bool {
        matches!(self, LoadState::Waiting)
    }

    pub const fn is_loaded(self) -> bool {
        matches!(self, LoadState::Loaded)
    }

    pub const fn is_loaded_with_data(self) -> bool {
        matches!(self, LoadState::LoadedWithData)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::Waiting => "waiting",
            LoadState::Loaded => "loaded",
            LoadState::LoadedWithData => "loaded_with_data",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_are_exclusive() {
        for state in [
            LoadState::waiting(),
            LoadState::loaded(),
            LoadState::loaded_with_data(),
        ] {
            let flags = [
                state.is_waiting(),
                state.is_loaded(),
                state.is_loaded_with_data(),
            ];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{state}");
        }
    }
}
