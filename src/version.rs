/// Build metadata, passed explicitly to whatever prints it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub compiler: String,
    pub build_time: String,
}

impl BuildInfo {
    /// Metadata baked in at compile time.
    ///
    /// `STREAMVISOR_COMPILER` and `STREAMVISOR_BUILD_TIME` may be set in the
    /// build environment; both default to `unknown`.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            compiler: option_env!("STREAMVISOR_COMPILER")
                .unwrap_or("unknown")
                .to_string(),
            build_time: option_env!("STREAMVISOR_BUILD_TIME")
                .unwrap_or("unknown")
                .to_string(),
        }
    }

    /// Just the version, for `--version`.
    pub fn short(&self) -> &str {
        &self.version
    }

    /// The startup banner.
    pub fn banner(&self) -> String {
        format!(
            "streamvisor version {}\nCompiler: {} - Build Time: {}",
            self.version, self.compiler, self.build_time
        )
    }
}
