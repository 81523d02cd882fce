//! Build metadata, printed by the `version` subcommand. Grounded on
//! `version/version.go`'s assembly of build-time vars plus `runtime.*`.

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub rustc_version: &'static str,
    pub target: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        rustc_version: "unknown",
        target: std::env::consts::ARCH,
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "spate version {}", self.version)?;
        writeln!(f, "  target: {}", self.target)?;
        write!(f, "  rustc: {}", self.rustc_version)
    }
}
