//! Availability probes for the optional numerical backends.
//!
//! Each backend is reported available when its shared library can be found
//! and the `USE_TORCH` / `USE_TF` toggles do not rule it out. The result is
//! computed once and carried in [`CacheSettings`](crate::CacheSettings)
//! rather than consulted through module globals.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::debug;

use crate::observability::LOG_TARGET;

/// Toggle forcing or disabling the Torch probe.
pub const USE_TORCH_ENV: &str = "USE_TORCH";
/// Toggle forcing or disabling the TensorFlow probe.
pub const USE_TF_ENV: &str = "USE_TF";

/// Optional numerical backend whose presence influences outbound metadata.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Backend {
    /// `libtorch`.
    Torch,
    /// `libtensorflow`.
    TensorFlow,
}

impl Backend {
    /// Short lowercase name used in user-agent strings and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Torch => "torch",
            Self::TensorFlow => "tensorflow",
        }
    }

    /// Environment variable pointing at the backend's installation root.
    const fn root_env(self) -> &'static str {
        match self {
            Self::Torch => "LIBTORCH",
            Self::TensorFlow => "LIBTENSORFLOW",
        }
    }

    /// Library stems probed for this backend.
    const fn library_stems(self) -> &'static [&'static str] {
        match self {
            Self::Torch => &["torch", "torch_cpu"],
            Self::TensorFlow => &["tensorflow"],
        }
    }
}

/// Parsed value of a `USE_*` toggle.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum BackendToggle {
    /// Unset or `AUTO`: report the backend when it is installed.
    #[default]
    Auto,
    /// `1`, `ON`, `YES` or `TRUE`: prefer this backend and suppress the other.
    Enabled,
    /// Any other value: report the backend as unavailable.
    Disabled,
}

impl BackendToggle {
    /// Parses a raw toggle value case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use cached_path::BackendToggle;
    ///
    /// assert_eq!(BackendToggle::parse("on"), BackendToggle::Enabled);
    /// assert_eq!(BackendToggle::parse("auto"), BackendToggle::Auto);
    /// assert_eq!(BackendToggle::parse("0"), BackendToggle::Disabled);
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Self::Auto,
            "1" | "ON" | "YES" | "TRUE" => Self::Enabled,
            _ => Self::Disabled,
        }
    }

    /// Reads the toggle from the named environment variable.
    fn from_env(name: &str) -> Self {
        env::var(name).map_or(Self::Auto, |raw| Self::parse(&raw))
    }

    const fn permits_probe(self) -> bool {
        matches!(self, Self::Auto | Self::Enabled)
    }
}

/// Detects whether a backend is installed in the current environment.
pub trait BackendProbe {
    /// Returns `true` when the backend can be loaded.
    fn is_installed(&self, backend: Backend) -> bool;
}

/// Probe that looks for the backend's shared library on disk.
///
/// Candidates are `$LIBTORCH/lib` / `$LIBTENSORFLOW/lib` followed by every
/// directory in the platform's dynamic library search path.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryProbe;

impl LibraryProbe {
    fn search_dirs(backend: Backend) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(raw_root) = env::var_os(backend.root_env()) {
            let root = PathBuf::from(raw_root);
            dirs.push(root.join("lib"));
            dirs.push(root);
        }
        if let Some(paths) = env::var_os(library_path_env()) {
            dirs.extend(env::split_paths(&paths));
        }
        dirs
    }
}

impl BackendProbe for LibraryProbe {
    fn is_installed(&self, backend: Backend) -> bool {
        let found = Self::search_dirs(backend).iter().find_map(|dir| {
            backend.library_stems().iter().find_map(|stem| {
                let candidate = dir.join(format!(
                    "{}{stem}{}",
                    env::consts::DLL_PREFIX,
                    env::consts::DLL_SUFFIX
                ));
                candidate.is_file().then_some(candidate)
            })
        });
        debug!(
            target: LOG_TARGET,
            backend = backend.name(),
            library = ?found,
            "probed backend library"
        );
        found.is_some()
    }
}

const fn library_path_env() -> &'static str {
    if cfg!(target_os = "windows") {
        "PATH"
    } else if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

/// Availability of the optional numerical backends.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct BackendAvailability {
    torch: bool,
    tensorflow: bool,
}

impl BackendAvailability {
    /// Constructs an explicit availability record.
    #[must_use]
    pub const fn new(torch: bool, tensorflow: bool) -> Self {
        Self { torch, tensorflow }
    }

    /// Detects availability from the process environment using [`LibraryProbe`].
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_with(
            &LibraryProbe,
            BackendToggle::from_env(USE_TORCH_ENV),
            BackendToggle::from_env(USE_TF_ENV),
        )
    }

    /// Detects availability with an explicit probe and toggle values.
    ///
    /// A backend forced on through its toggle suppresses the other one, and
    /// a backend whose toggle is disabled is never probed.
    #[must_use]
    pub fn detect_with(
        probe: &impl BackendProbe,
        use_torch: BackendToggle,
        use_tf: BackendToggle,
    ) -> Self {
        let torch = use_torch.permits_probe()
            && use_tf != BackendToggle::Enabled
            && probe.is_installed(Backend::Torch);
        let tensorflow = use_tf.permits_probe()
            && use_torch != BackendToggle::Enabled
            && probe.is_installed(Backend::TensorFlow);
        Self { torch, tensorflow }
    }

    /// Returns the availability detected for this process, probing on first
    /// use only.
    #[must_use]
    pub fn current() -> Self {
        static PROCESS_BACKENDS: OnceLock<BackendAvailability> = OnceLock::new();
        *PROCESS_BACKENDS.get_or_init(Self::detect)
    }

    /// Whether the Torch backend is available.
    #[must_use]
    pub const fn torch_available(&self) -> bool {
        self.torch
    }

    /// Whether the TensorFlow backend is available.
    #[must_use]
    pub const fn tensorflow_available(&self) -> bool {
        self.tensorflow
    }

    /// Iterates over the available backends.
    pub fn available(&self) -> impl Iterator<Item = Backend> {
        [
            (Backend::Torch, self.torch),
            (Backend::TensorFlow, self.tensorflow),
        ]
        .into_iter()
        .filter_map(|(backend, present)| present.then_some(backend))
    }
}
