//! Platform table: how each device OS is driven

/// Device operating system, as named in the testbed `os:` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Ios,
    Iosxe,
    Nxos,
    Linux,
}

impl Os {
    /// Match a testbed `os:` value; `None` for platforms that cannot be driven
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ios" => Some(Os::Ios),
            "iosxe" => Some(Os::Iosxe),
            "nxos" => Some(Os::Nxos),
            "linux" => Some(Os::Linux),
            _ => None,
        }
    }

    /// Cisco platforms are driven through an interactive PTY shell
    pub fn uses_cli_shell(self) -> bool {
        !matches!(self, Os::Linux)
    }

    /// Commands sent right after login to disable paging and wrapping
    pub fn session_setup(self) -> &'static [&'static str] {
        match self {
            Os::Ios | Os::Iosxe | Os::Nxos => &["terminal length 0", "terminal width 511"],
            Os::Linux => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Os::Ios => "ios",
            Os::Iosxe => "iosxe",
            Os::Nxos => "nxos",
            Os::Linux => "linux",
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
