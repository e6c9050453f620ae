//! CLI output levels

/// How talkative the CLI is
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LogLevel {
    /// Errors only
    Quiet,
    /// Progress messages
    Normal,
    /// Progress plus resolution details
    Verbose,
}

impl LogLevel {
    /// Derive the level from the global `--verbose` / `--quiet` flags;
    /// quiet wins when both are given
    #[must_use]
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            LogLevel::Quiet
        } else if verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }

    /// Print a progress message (suppressed by `--quiet`)
    pub fn info(self, msg: &str) {
        if self != LogLevel::Quiet {
            println!("{msg}");
        }
    }

    /// Print a detail message (only with `--verbose`)
    pub fn detail(self, msg: &str) {
        if self == LogLevel::Verbose {
            println!("{msg}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_wins_over_verbose() {
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Quiet);
        assert_eq!(LogLevel::from_flags(true, false), LogLevel::Verbose);
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Normal);
    }
}
