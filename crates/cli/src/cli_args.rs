//! Command line flags (spec §6 "CLI").

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "conversant", about = "Personal-assistant middleware for a cloud-controlled smart speaker")]
pub struct CliArgs {
    /// Config file path. Defaults to searching `~/.conversant/conversant.{toml,json}`.
    #[arg(short = 'c', long = "config-path")]
    pub config_path: Option<String>,

    /// Log level: trace|info|warn|error|off. Defaults to `RUST_LOG`.
    #[arg(short = 'd', long = "log-level")]
    pub log_level: Option<String>,

    /// Trigger mode: poll the dialog log only on an external trigger
    /// signal instead of continuously.
    #[arg(short = 't', long = "trigger")]
    pub trigger: bool,

    /// Web UI bind address, `[addr]:port`, or `-` to disable it entirely.
    #[arg(short = 'w', long = "web")]
    pub web: Option<String>,

    /// Open the config page in the default browser after startup.
    #[arg(long = "config")]
    pub open_config: bool,

    /// Open the chat page in the default browser after startup.
    #[arg(long = "webui")]
    pub open_webui: bool,
}

impl CliArgs {
    /// `None` means "web UI disabled" (`-w -`); `Some(addr)` is what to bind.
    pub fn web_bind_addr(&self) -> Option<String> {
        match self.web.as_deref() {
            Some("-") => None,
            Some(addr) => Some(default_host(addr)),
            None => Some("0.0.0.0:4000".to_string()),
        }
    }
}

fn default_host(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_disables_web_ui() {
        let args = CliArgs { config_path: None, log_level: None, trigger: false, web: Some("-".into()), open_config: false, open_webui: false };
        assert_eq!(args.web_bind_addr(), None);
    }

    #[test]
    fn bare_port_gets_a_wildcard_host() {
        let args = CliArgs { config_path: None, log_level: None, trigger: false, web: Some(":8080".into()), open_config: false, open_webui: false };
        assert_eq!(args.web_bind_addr(), Some("0.0.0.0:8080".to_string()));
    }
}
