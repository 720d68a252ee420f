use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicU8, Ordering},
};

use log::debug;

use super::{
    config::{
        Environment, ProcessEnv, DISABLE_COMPILATION_INFO_VAR, DISABLE_PIPELINE_ASYNC_VAR,
        ENABLE_COMPILATION_INFO_VAR, ENABLE_PIPELINE_ASYNC_VAR,
    },
    path::{data_dir, resolve_lib_path},
};

const MARKER_PREFIX: &str = "lib_path=";

/// Optional native APIs that are only attempted after an explicit trust
/// decision, even when their symbols are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    PipelineAsync,
    CompilationInfo,
}

impl Feature {
    pub fn enable_var(&self) -> &'static str {
        match self {
            Feature::PipelineAsync => ENABLE_PIPELINE_ASYNC_VAR,
            Feature::CompilationInfo => ENABLE_COMPILATION_INFO_VAR,
        }
    }

    pub fn disable_var(&self) -> &'static str {
        match self {
            Feature::PipelineAsync => DISABLE_PIPELINE_ASYNC_VAR,
            Feature::CompilationInfo => DISABLE_COMPILATION_INFO_VAR,
        }
    }

    pub fn marker_name(&self) -> &'static str {
        match self {
            Feature::PipelineAsync => "pipeline_async.ok",
            Feature::CompilationInfo => "compilation_info.ok",
        }
    }
}

/// Reads the library path recorded in a marker file.
///
/// The file is one `lib_path=<path>` line with an optional `\n` or `\r\n`.
pub fn read_marker(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let line = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(&text);
    if line.contains('\n') {
        return None;
    }
    line.strip_prefix(MARKER_PREFIX)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
}

/// Disable beats enable, enable beats the marker, and a marker only counts if
/// it was recorded for the exact path this process would load.
pub fn decide(feature: Feature, env: &impl Environment) -> bool {
    if env.flag(feature.disable_var()) {
        debug!("{feature:?} disabled by {}", feature.disable_var());
        return false;
    }
    if env.flag(feature.enable_var()) {
        debug!("{feature:?} enabled by {}", feature.enable_var());
        return true;
    }
    let marker = match data_dir(env) {
        Some(dir) => dir.join(feature.marker_name()),
        None => return false,
    };
    match (read_marker(&marker), resolve_lib_path(env)) {
        (Some(recorded), Some(current)) if recorded == current => {
            debug!("{feature:?} enabled by marker {}", marker.display());
            true
        }
        (Some(recorded), _) => {
            debug!("{feature:?} marker was recorded for {recorded}, ignoring");
            false
        }
        _ => false,
    }
}

const UNDECIDED: u8 = 0;
const OFF: u8 = 1;
const ON: u8 = 2;

/// Per-process memo of a `decide` result that callers can override.
pub struct FeatureSwitch {
    feature: Feature,
    state: AtomicU8,
}

impl FeatureSwitch {
    pub const fn new(feature: Feature) -> Self {
        FeatureSwitch {
            feature,
            state: AtomicU8::new(UNDECIDED),
        }
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    pub fn enabled(&self) -> bool {
        self.enabled_with(&ProcessEnv)
    }

    pub fn enabled_with(&self, env: &impl Environment) -> bool {
        match self.state.load(Ordering::Acquire) {
            ON => true,
            OFF => false,
            _ => {
                let decided = if decide(self.feature, env) { ON } else { OFF };
                // A concurrent `set_enabled` takes precedence over our decision.
                let _ = self.state.compare_exchange(
                    UNDECIDED,
                    decided,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                self.state.load(Ordering::Acquire) == ON
            }
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state
            .store(if enabled { ON } else { OFF }, Ordering::Release);
    }

    /// Forgets the memoized decision; the next query re-reads the environment.
    pub fn reset(&self) {
        self.state.store(UNDECIDED, Ordering::Release);
    }
}

pub static PIPELINE_ASYNC: FeatureSwitch = FeatureSwitch::new(Feature::PipelineAsync);
pub static COMPILATION_INFO: FeatureSwitch = FeatureSwitch::new(Feature::CompilationInfo);

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::core::config::{MapEnv, HOME_VAR, LIB_OVERRIDE_VAR, XDG_DATA_HOME_VAR};

    fn env_in(dir: &Path) -> MapEnv {
        MapEnv::new()
            .with(HOME_VAR, dir.to_str().unwrap())
            .with(XDG_DATA_HOME_VAR, dir.join("data").to_str().unwrap())
            .with(LIB_OVERRIDE_VAR, "/opt/wgpu/libwgpu_native.so")
    }

    fn write_marker(env: &MapEnv, feature: Feature, contents: &str) -> PathBuf {
        let dir = data_dir(env).unwrap();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(feature.marker_name());
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn marker_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.ok");
        for (contents, expected) in [
            ("lib_path=/a/b.so", Some("/a/b.so")),
            ("lib_path=/a/b.so\n", Some("/a/b.so")),
            ("lib_path=/a/b.so\r\n", Some("/a/b.so")),
            ("lib_path=", None),
            ("path=/a/b.so\n", None),
            ("lib_path=/a\nlib_path=/b\n", None),
        ] {
            fs::write(&path, contents).unwrap();
            assert_eq!(read_marker(&path).as_deref(), expected, "{contents:?}");
        }
        assert_eq!(read_marker(&dir.path().join("missing.ok")), None);
    }

    #[test]
    fn default_is_off() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(dir.path());
        assert!(!decide(Feature::PipelineAsync, &env));
        assert!(!decide(Feature::CompilationInfo, &env));
    }

    #[test]
    fn disable_beats_enable_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = env_in(dir.path());
        write_marker(&env, Feature::PipelineAsync, "lib_path=/opt/wgpu/libwgpu_native.so\n");
        env.set(ENABLE_PIPELINE_ASYNC_VAR, "1");
        env.set(DISABLE_PIPELINE_ASYNC_VAR, "yes");
        assert!(!decide(Feature::PipelineAsync, &env));
    }

    #[test]
    fn enable_without_marker() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(dir.path()).with(ENABLE_COMPILATION_INFO_VAR, "true");
        assert!(decide(Feature::CompilationInfo, &env));
        assert!(!decide(Feature::PipelineAsync, &env));
    }

    #[test]
    fn falsy_disable_does_not_disable() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(dir.path())
            .with(DISABLE_PIPELINE_ASYNC_VAR, "0")
            .with(ENABLE_PIPELINE_ASYNC_VAR, "1");
        assert!(decide(Feature::PipelineAsync, &env));
    }

    #[test]
    fn marker_must_match_resolved_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = env_in(dir.path());
        write_marker(&env, Feature::PipelineAsync, "lib_path=/opt/wgpu/libwgpu_native.so\n");
        assert!(decide(Feature::PipelineAsync, &env));

        env.set(LIB_OVERRIDE_VAR, "/elsewhere/libwgpu_native.so");
        assert!(!decide(Feature::PipelineAsync, &env));
    }

    #[test]
    fn marker_is_per_feature() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(dir.path());
        write_marker(&env, Feature::CompilationInfo, "lib_path=/opt/wgpu/libwgpu_native.so");
        assert!(decide(Feature::CompilationInfo, &env));
        assert!(!decide(Feature::PipelineAsync, &env));
    }

    #[test]
    fn switch_memoizes_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let switch = FeatureSwitch::new(Feature::PipelineAsync);
        let on = env_in(dir.path()).with(ENABLE_PIPELINE_ASYNC_VAR, "1");
        let off = env_in(dir.path());

        assert!(switch.enabled_with(&on));
        assert!(switch.enabled_with(&off));

        switch.set_enabled(false);
        assert!(!switch.enabled_with(&on));

        switch.reset();
        assert!(!switch.enabled_with(&off));
    }
}
