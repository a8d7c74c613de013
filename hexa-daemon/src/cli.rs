//! CLI surface for the session daemon binary.
//!
//! Grounded on `alacritty_multiplexer::cli::MuxSubcommand`'s subcommand
//! shape, expanded to the exact flag surface of spec §6 and switched from a
//! hand-rolled enum to `clap`'s derive macros — the teacher's own choice for
//! its `alacritty` binary crate (`clap = { features = ["derive", "env"] }`).

use clap::Parser;

/// `hexa-daemon`: the session daemon that owns PTY masters across frontend
/// restarts.
#[derive(Debug, Parser)]
#[command(name = "hexa-daemon", about = "Session daemon for the hexa multiplexer")]
pub struct Cli {
    /// Daemonize: double-fork, redirect stdio to /dev/null, chdir to /.
    #[arg(short = 'd', long = "daemon")]
    pub daemon: bool,

    /// Connect to a running daemon and print its status, then exit.
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Broadcast a notification message to every connected frontend, then
    /// exit.
    #[arg(short = 'n', long = "notify", value_name = "MSG")]
    pub notify: Option<String>,

    /// Path to the daemon configuration file; defaults to
    /// `$XDG_CONFIG_HOME/hexa/daemon.toml`.
    #[arg(long = "config")]
    pub config: Option<std::path::PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_daemon_flag() {
        let cli = Cli::parse_from(["hexa-daemon", "-d"]);
        assert!(cli.daemon);
        assert!(!cli.list);
    }

    #[test]
    fn parses_notify_with_message() {
        let cli = Cli::parse_from(["hexa-daemon", "--notify", "build finished"]);
        assert_eq!(cli.notify.as_deref(), Some("build finished"));
    }

    #[test]
    fn parses_list_flag() {
        let cli = Cli::parse_from(["hexa-daemon", "-l"]);
        assert!(cli.list);
    }

    #[test]
    fn no_flags_is_the_default_foreground_run() {
        let cli = Cli::parse_from(["hexa-daemon"]);
        assert!(!cli.daemon);
        assert!(!cli.list);
        assert!(cli.notify.is_none());
    }
}
