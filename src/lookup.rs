//! Turning daemon answers into OS labels

use std::{
    borrow::Cow,
    fmt::{self, Display},
};

use crate::{
    config::{Config, Sentinels},
    error::{Error, Result},
    internal,
    logging::LogSink,
    protocol::{Query, Response, Status},
    transport::{Client, runtime},
};

/// The outcome of a lookup, before it is rendered to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsLookup {
    /// The daemon couldn't be asked, or gave an answer we can't use.
    Failed,
    /// The daemon has no record of the host.
    NotFound,
    /// The daemon knows the host, but not its OS.
    Unknown,
    Detected {
        name: String,
        flavor: Option<String>,
    },
}

impl OsLookup {
    /// Render using `sentinels` for everything but a detected OS.
    #[must_use]
    pub fn render<'a>(&'a self, sentinels: &'a Sentinels) -> Cow<'a, str> {
        match self {
            Self::Failed => Cow::Borrowed(sentinels.failed.as_str()),
            Self::NotFound => Cow::Borrowed(sentinels.not_found.as_str()),
            Self::Unknown => Cow::Borrowed(sentinels.unknown.as_str()),
            Self::Detected { name, flavor: None } => Cow::Borrowed(name.as_str()),
            Self::Detected {
                name,
                flavor: Some(flavor),
            } => Cow::Owned(format!("{name} {flavor}")),
        }
    }
}

impl Display for OsLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => f.write_str(crate::config::FAILED),
            Self::NotFound => f.write_str(crate::config::NOT_FOUND),
            Self::Unknown => f.write_str(crate::config::UNKNOWN),
            Self::Detected { name, flavor: None } => f.write_str(name),
            Self::Detected {
                name,
                flavor: Some(flavor),
            } => write!(f, "{name} {flavor}"),
        }
    }
}

/// Decide what `response` says about the host's OS.
///
/// `None` means the exchange itself failed (and was already logged).
/// Protocol violations are logged here; a missing match is not.
pub fn interpret(response: Option<&Response>, sink: &dyn LogSink) -> OsLookup {
    let Some(response) = response else {
        return OsLookup::Failed;
    };

    if !response.has_valid_magic() {
        sink.log_write("p0f: Bad response magic.");
        return OsLookup::Failed;
    }

    match response.status() {
        Status::BadQuery => {
            sink.log_write("p0f: We were misunderstood.");
            return OsLookup::Failed;
        }
        Status::NoMatch => return OsLookup::NotFound,
        Status::Ok => {}
        status @ Status::Other(_) => {
            internal!(level = DEBUG, "Treating {status} as a match");
        }
    }

    let name = response.os_name();
    if name.is_empty() {
        return OsLookup::Unknown;
    }

    let flavor = response.os_flavor();

    OsLookup::Detected {
        name: name.into_owned(),
        flavor: (!flavor.is_empty()).then(|| flavor.into_owned()),
    }
}

impl Client {
    /// Ask the daemon about `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedAddress`] if `address` isn't an IPv4 or
    /// IPv6 address, or [`Error::Socket`] if no socket could be created.
    /// Daemon and protocol trouble is logged to `sink` and comes back as
    /// [`OsLookup::Failed`].
    pub async fn lookup(&self, address: &str, sink: &dyn LogSink) -> Result<OsLookup> {
        let query = Query::parse(address)?;
        let response = self.exchange(&query, sink).await?;

        Ok(interpret(response.as_ref(), sink))
    }

    /// [`Client::lookup`] for callers without an async runtime.
    ///
    /// # Errors
    ///
    /// As [`Client::lookup`], plus [`Error::Runtime`] if the I/O driver for
    /// the call can't be started.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn lookup_blocking(&self, address: &str, sink: &dyn LogSink) -> Result<OsLookup> {
        let query = Query::parse(address)?;

        let response = runtime()?.block_on(self.exchange(&query, sink))?;

        Ok(interpret(response.as_ref(), sink))
    }
}

/// Look up the OS of a host: `arguments` are the daemon socket path and the
/// host's IP address, in that order.
///
/// # Errors
///
/// Returns an error for the wrong number of arguments, a socket path that is
/// too long, an address that can't be parsed, or when no socket could be
/// created. Every other failure is logged and rendered as the `failed`
/// sentinel.
///
/// # Panics
///
/// Panics if called from within an async runtime; async callers should use
/// [`Client::lookup`].
pub fn p0f_os<S: AsRef<str>>(
    arguments: &[S],
    config: &Config,
    sink: &dyn LogSink,
) -> Result<String> {
    let [socket_path, address] = arguments else {
        return Err(Error::InvalidArguments {
            expected: 2,
            got: arguments.len(),
        });
    };

    let client = Client::new(socket_path.as_ref())?.with_timeout(config.timeout());
    let lookup = client.lookup_blocking(address.as_ref(), sink)?;

    internal!("{} => {lookup:?}", address.as_ref());

    Ok(lookup.render(&config.sentinels).into_owned())
}
