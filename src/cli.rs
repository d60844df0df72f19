use crate::ServerConfig;
use anyhow::Context;

use std::net::IpAddr;
use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[command(name = "git-http-server", version = crate::VERSION)]
#[command(about = "Serve git repositories over smart HTTP")]
// clap's auto version flag is -V; this CLI promises -v.
#[command(disable_version_flag = true)]
pub struct Args {
    #[arg(
        short = 'i',
        long = "ip",
        env = "GIT_HTTP_IP",
        value_name = "ADDR",
        help = "IP address of the allowed client"
    )]
    pub ip: Option<IpAddr>,

    #[arg(
        short = 'H',
        long = "host",
        env = "GIT_HTTP_HOST",
        default_value = "0.0.0.0",
        value_name = "HOST",
        help = "host on which to listen"
    )]
    pub host: String,

    #[arg(
        short = 'p',
        long = "port",
        env = "GIT_HTTP_PORT",
        default_value_t = 8174,
        value_name = "PORT",
        value_parser = clap::value_parser!(u16).range(1..),
        help = "port on which to listen"
    )]
    pub port: u16,

    // GIT_HTTP_READONLY is truthy by presence: any value that is not
    // false-like enables the flag.
    #[arg(
        short = 'r',
        long = "readonly",
        env = "GIT_HTTP_READONLY",
        value_parser = clap::builder::FalseyValueParser::new(),
        help = "operate in read-only mode"
    )]
    pub readonly: bool,

    #[arg(
        short = 'u',
        long = "updates",
        help = "check for available updates and exit"
    )]
    pub updates: bool,

    #[arg(
        short = 'v',
        long = "version",
        action = clap::ArgAction::Version,
        help = "print the version number and exit"
    )]
    pub version: Option<bool>,

    #[arg(value_name = "DIR", help = "directory to serve repositories from")]
    pub dir: Option<PathBuf>,
}

impl Args {
    /// Resolve the parsed flags into the immutable server configuration.
    /// The working directory must exist; repository sub-paths resolve
    /// under it.
    pub fn into_config(self) -> anyhow::Result<ServerConfig> {
        let working_dir = match self.dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("failed to determine current directory")?,
        };

        let working_dir = working_dir
            .canonicalize()
            .with_context(|| format!("working directory not found: {}", working_dir.display()))?;

        anyhow::ensure!(
            working_dir.is_dir(),
            "not a directory: {}",
            working_dir.display()
        );

        Ok(ServerConfig {
            working_dir,
            bind_host: self.host,
            bind_port: self.port,
            allowed_client: self.ip,
            read_only: self.readonly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["git-http-server"]).unwrap();
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 8174);
        assert!(args.ip.is_none());
        assert!(args.dir.is_none());
    }

    #[test]
    fn short_version_flag_prints_version() {
        use clap::error::ErrorKind;

        let err = Args::try_parse_from(["git-http-server", "-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);

        let err = Args::try_parse_from(["git-http-server", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn readonly_from_environment() {
        // Covers values the bool parser would reject, like "1".
        std::env::set_var("GIT_HTTP_READONLY", "1");
        let args = Args::try_parse_from(["git-http-server"]).unwrap();
        assert!(args.readonly);

        std::env::set_var("GIT_HTTP_READONLY", "false");
        let args = Args::try_parse_from(["git-http-server"]).unwrap();
        assert!(!args.readonly);

        std::env::remove_var("GIT_HTTP_READONLY");
        let args = Args::try_parse_from(["git-http-server"]).unwrap();
        assert!(!args.readonly);
    }

    #[test]
    fn flags() {
        let args = Args::try_parse_from([
            "git-http-server",
            "-r",
            "-p",
            "9000",
            "-H",
            "127.0.0.1",
            "-i",
            "10.0.0.7",
            "/srv/git",
        ])
        .unwrap();

        assert!(args.readonly);
        assert_eq!(args.port, 9000);
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.ip, Some("10.0.0.7".parse().unwrap()));
        assert_eq!(args.dir, Some(PathBuf::from("/srv/git")));
    }

    #[test]
    fn rejects_port_zero_and_unknown_flags() {
        assert!(Args::try_parse_from(["git-http-server", "-p", "0"]).is_err());
        assert!(Args::try_parse_from(["git-http-server", "--no-such-flag"]).is_err());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let args =
            Args::try_parse_from(["git-http-server", "/no/such/dir/git-http-server"]).unwrap();
        assert!(args.into_config().is_err());
    }
}
