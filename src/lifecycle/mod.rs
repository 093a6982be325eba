//! The `lxc-*` invocation surface: lifecycle verbs and create flags.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Template used by `lxc-create` when none is requested.
pub const DEFAULT_TEMPLATE: &str = "ubuntu-cloud";

/// Lifecycle verbs that map onto `lxc-<verb> -n <name> <args...>`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LifecycleVerb {
    /// `lxc-start`
    Start,
    /// `lxc-stop`
    Stop,
    /// `lxc-shutdown`
    Shutdown,
    /// `lxc-destroy`
    Destroy,
    /// `lxc-execute`
    Execute,
    /// `lxc-kill`
    Kill,
    /// `lxc-wait`
    Wait,
    /// `lxc-cgroup`
    Cgroup,
    /// `lxc-ps`
    Ps,
    /// `lxc-info`
    Info,
    /// `lxc-freeze`
    Freeze,
    /// `lxc-unfreeze`
    Unfreeze,
    /// `lxc-netstat`
    Netstat,
}

impl LifecycleVerb {
    /// Every verb, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Start,
        Self::Stop,
        Self::Shutdown,
        Self::Destroy,
        Self::Execute,
        Self::Kill,
        Self::Wait,
        Self::Cgroup,
        Self::Ps,
        Self::Info,
        Self::Freeze,
        Self::Unfreeze,
        Self::Netstat,
    ];

    /// Verb name as used on the command line (`start`, `destroy`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Shutdown => "shutdown",
            Self::Destroy => "destroy",
            Self::Execute => "execute",
            Self::Kill => "kill",
            Self::Wait => "wait",
            Self::Cgroup => "cgroup",
            Self::Ps => "ps",
            Self::Info => "info",
            Self::Freeze => "freeze",
            Self::Unfreeze => "unfreeze",
            Self::Netstat => "netstat",
        }
    }

    /// Program implementing the verb.
    #[must_use]
    pub fn program(self) -> String {
        format!("lxc-{}", self.as_str())
    }

    /// Arguments for `lxc-<verb>` scoped to `name`.
    #[must_use]
    pub fn args(self, name: &str, extra: &[OsString]) -> Vec<OsString> {
        let mut args = Vec::with_capacity(extra.len() + 2);
        args.push(OsString::from("-n"));
        args.push(OsString::from(name));
        args.extend_from_slice(extra);
        args
    }
}

impl fmt::Display for LifecycleVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a verb name is not recognised.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown lifecycle verb: {0}")]
pub struct UnknownVerb(pub String);

impl FromStr for LifecycleVerb {
    type Err = UnknownVerb;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().trim_start_matches("lxc-");
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownVerb(value.to_owned()))
    }
}

/// Options for `lxc-create`.
///
/// Recognised template options get dedicated fields; anything else lands in
/// `extra` and is passed through verbatim as `--key=value`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateOptions {
    /// Template name; [`DEFAULT_TEMPLATE`] when absent.
    pub template: Option<String>,
    /// `--hostid`: instance identifier for cloud templates.
    pub hostid: Option<String>,
    /// `--userdata`: cloud-init user-data file.
    pub userdata: Option<String>,
    /// `--auth-key`: public key authorised for the default user.
    pub auth_key: Option<String>,
    /// `--arch`: target architecture.
    pub arch: Option<String>,
    /// `--release`: distribution release.
    pub release: Option<String>,
    /// Additional template flags, keyed without the leading dashes.
    pub extra: BTreeMap<String, String>,
}

impl CreateOptions {
    /// Starts from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the template.
    #[must_use]
    pub fn template(mut self, value: impl Into<String>) -> Self {
        self.template = Some(value.into());
        self
    }

    /// Sets the release.
    #[must_use]
    pub fn release(mut self, value: impl Into<String>) -> Self {
        self.release = Some(value.into());
        self
    }

    /// Sets the architecture.
    #[must_use]
    pub fn arch(mut self, value: impl Into<String>) -> Self {
        self.arch = Some(value.into());
        self
    }

    /// Sets the authorised key.
    #[must_use]
    pub fn auth_key(mut self, value: impl Into<String>) -> Self {
        self.auth_key = Some(value.into());
        self
    }

    /// Records a flag, routing recognised keys to their dedicated field.
    #[must_use]
    pub fn flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let raw_key = key.into();
        let flag_value = value.into();
        match raw_key.trim_start_matches('-') {
            "template" | "t" => self.template = Some(flag_value),
            "hostid" => self.hostid = Some(flag_value),
            "userdata" => self.userdata = Some(flag_value),
            "auth-key" => self.auth_key = Some(flag_value),
            "arch" => self.arch = Some(flag_value),
            "release" => self.release = Some(flag_value),
            other => {
                self.extra.insert(other.to_owned(), flag_value);
            }
        }
        self
    }

    /// Layers `overrides` on top of `self`; set fields in `overrides` win.
    #[must_use]
    pub fn merged(mut self, overrides: Self) -> Self {
        let Self {
            template,
            hostid,
            userdata,
            auth_key,
            arch,
            release,
            extra,
        } = overrides;
        self.template = template.or(self.template);
        self.hostid = hostid.or(self.hostid);
        self.userdata = userdata.or(self.userdata);
        self.auth_key = auth_key.or(self.auth_key);
        self.arch = arch.or(self.arch);
        self.release = release.or(self.release);
        self.extra.extend(extra);
        self
    }

    /// Template to pass to `-t`.
    #[must_use]
    pub fn template_name(&self) -> &str {
        self.template.as_deref().unwrap_or(DEFAULT_TEMPLATE)
    }

    /// Renders the template flags as `--key=value` tokens.
    ///
    /// Recognised options come first in a fixed order, followed by the
    /// passthrough flags sorted by key. The template itself is never
    /// rendered here.
    #[must_use]
    pub fn template_flags(&self) -> Vec<OsString> {
        let known = [
            ("hostid", self.hostid.as_deref()),
            ("userdata", self.userdata.as_deref()),
            ("auth-key", self.auth_key.as_deref()),
            ("arch", self.arch.as_deref()),
            ("release", self.release.as_deref()),
        ];
        known
            .into_iter()
            .filter_map(|(key, value)| value.map(|inner| (key, inner)))
            .chain(
                self.extra
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            )
            .map(|(key, value)| OsString::from(format!("--{key}={value}")))
            .collect()
    }

    /// Full argument list for `lxc-create -n <name> -t <template> -- <flags>`.
    #[must_use]
    pub fn create_args(&self, name: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-n"),
            OsString::from(name),
            OsString::from("-t"),
            OsString::from(self.template_name()),
            OsString::from("--"),
        ];
        args.extend(self.template_flags());
        args
    }
}
