//! Daemon configuration, read once from the environment at startup

use bashpanel_api_rpc::RpcServerConfig;
use bashpanel_core::application::constants::DEFAULT_RELAY_RETENTION;
use bashpanel_core::error::{AppError, Result};
use bashpanel_infra_system::SshConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SCRIPTS_DIR: &str = "~/.bashpanel/scripts";

/// How runs reach a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Ssh(SshConfig),
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub transport: Transport,
    pub rpc: RpcServerConfig,
    pub scripts_dir: PathBuf,
    /// SIGKILL escalation after an unanswered cancel
    pub kill_grace: Option<Duration>,
    pub relay_retention: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup (tests pass a map)
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let transport = match env.first(&["BASHPANEL_TRANSPORT"]).as_deref() {
            None | Some("ssh") => Transport::Ssh(ssh_config(&env)?),
            Some("local") => Transport::Local,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "BASHPANEL_TRANSPORT must be ssh or local, got {}",
                    other
                )))
            }
        };

        let mut rpc = RpcServerConfig::default();
        if let Some(host) = env.first(&["BASHPANEL_RPC_HOST"]) {
            rpc.host = host;
        }
        if let Some(port) = env.parse(&["BASHPANEL_RPC_PORT", "PORT"])? {
            rpc.port = port;
        }

        let scripts_dir = env
            .first(&["BASHPANEL_SCRIPTS_DIR"])
            .unwrap_or_else(|| DEFAULT_SCRIPTS_DIR.to_string());

        let relay_retention = env
            .parse::<u64>(&["BASHPANEL_RELAY_RETENTION_SECS"])?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RELAY_RETENTION);

        Ok(Self {
            transport,
            rpc,
            scripts_dir: expand(&scripts_dir),
            kill_grace: env
                .parse::<u64>(&["BASHPANEL_KILL_GRACE_MS"])?
                .map(Duration::from_millis),
            relay_retention,
        })
    }
}

fn ssh_config<F>(env: &Env<F>) -> Result<SshConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let user = env.first(&["BASHPANEL_HOST_USER", "HOST_USER"]);
    let key_path = env.first(&["BASHPANEL_SSH_KEY_PATH", "SSH_KEY_PATH"]);

    let (user, key_path) = match (user, key_path) {
        (Some(user), Some(key_path)) => (user, key_path),
        (user, _) => {
            let missing = if user.is_none() {
                "HOST_USER"
            } else {
                "SSH_KEY_PATH"
            };
            return Err(AppError::Config(format!(
                "ssh transport requires {} (or BASHPANEL_{})",
                missing, missing
            )));
        }
    };

    let mut ssh = SshConfig::new(user, expand(&key_path));
    if let Some(host) = env.first(&["BASHPANEL_SSH_HOST"]) {
        ssh.host = host;
    }
    ssh.port = env.parse(&["BASHPANEL_SSH_PORT"])?;
    if let Some(mode) = env.first(&["BASHPANEL_SSH_STRICT_HOST_KEY"]) {
        ssh.strict_host_key_checking = mode;
    }
    if let Some(force_tty) = env.first(&["BASHPANEL_SSH_FORCE_TTY"]) {
        ssh.force_tty = parse_bool("BASHPANEL_SSH_FORCE_TTY", &force_tty)?;
    }
    // expanded by the remote shell, not here
    if let Some(dir) = env.first(&["BASHPANEL_REMOTE_SCRIPT_DIR"]) {
        ssh.remote_script_dir = dir;
    }
    Ok(ssh)
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// First non-empty value among `keys`, with the key it came from
    fn lookup(&self, keys: &[&'static str]) -> Option<(&'static str, String)> {
        keys.iter().find_map(|key| {
            (self.0)(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (*key, value))
        })
    }

    fn first(&self, keys: &[&'static str]) -> Option<String> {
        self.lookup(keys).map(|(_, value)| value)
    }

    fn parse<T: FromStr>(&self, keys: &[&'static str]) -> Result<Option<T>> {
        match self.lookup(keys) {
            None => Ok(None),
            Some((key, value)) => value.parse().map(Some).map_err(|_| {
                AppError::Config(format!("{} has an invalid value: {}", key, value))
            }),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "{} must be a boolean, got {}",
            key, value
        ))),
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
