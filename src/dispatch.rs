//! Purpose: Interpret one verb plus positional arguments against the handle registry.
//! Exports: `Bridge`, `BridgeConfig`, `Verb`, `Arg`, `Reply`, `VERBS`.
//! Role: Command layer between the host adapters (protocol, ABI) and `core`.
//! Invariants: Verbs form a closed set; name and arity live in one table.
//! Invariants: Every handle argument resolves before any effect; failures change nothing.
//! Invariants: Every value produced for the host is registered before its handle is returned.
use tracing::debug;

use crate::core::complex::Complex;
use crate::core::error::{Error, ErrorKind};
use crate::core::handle::Handle;
use crate::core::raw::{RawArray, RawPair};
use crate::core::registry::{Registry, TeardownPolicy, TeardownReport};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    New,
    NewFromMatlab,
    Delete,
    IsValid,
    Display,
    Double,
    Plus,
    PlusInPlace,
    Count,
}

/// Static description of a verb: wire name and accepted argument counts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VerbSpec {
    pub verb: Verb,
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
}

pub const VERBS: &[VerbSpec] = &[
    VerbSpec { verb: Verb::New, name: "new", min_args: 0, max_args: 1 },
    VerbSpec { verb: Verb::NewFromMatlab, name: "newFromMatlab", min_args: 1, max_args: 1 },
    VerbSpec { verb: Verb::Delete, name: "delete", min_args: 1, max_args: 1 },
    VerbSpec { verb: Verb::IsValid, name: "isValid", min_args: 1, max_args: 1 },
    VerbSpec { verb: Verb::Display, name: "display", min_args: 1, max_args: 1 },
    VerbSpec { verb: Verb::Double, name: "double", min_args: 1, max_args: 1 },
    VerbSpec { verb: Verb::Plus, name: "plus", min_args: 2, max_args: 2 },
    VerbSpec { verb: Verb::PlusInPlace, name: "plusInPlace", min_args: 2, max_args: 2 },
    VerbSpec { verb: Verb::Count, name: "count", min_args: 0, max_args: 0 },
];

impl Verb {
    pub fn parse(name: &str) -> Result<Verb, Error> {
        VERBS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.verb)
            .ok_or_else(|| {
                Error::new(ErrorKind::UnrecognizedCommand)
                    .with_message(format!("command not recognized: {name}"))
            })
    }

    pub fn spec(self) -> &'static VerbSpec {
        match VERBS.iter().find(|spec| spec.verb == self) {
            Some(spec) => spec,
            None => unreachable!("every verb has a table entry"),
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    fn check_arity(self, count: usize) -> Result<(), Error> {
        let spec = self.spec();
        if count < spec.min_args || count > spec.max_args {
            let expected = if spec.min_args == spec.max_args {
                spec.min_args.to_string()
            } else {
                format!("{} to {}", spec.min_args, spec.max_args)
            };
            return Err(Error::new(ErrorKind::ArityError).with_message(format!(
                "{}: expected {expected} argument(s), got {count}",
                spec.name
            )));
        }
        Ok(())
    }
}

/// One decoded positional argument from the host.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Handle(Handle),
    Scalar(f64),
    Array(RawArray),
    Text(String),
}

impl Arg {
    fn kind_name(&self) -> &'static str {
        match self {
            Arg::Handle(_) => "handle",
            Arg::Scalar(_) => "scalar",
            Arg::Array(_) => "array",
            Arg::Text(_) => "text",
        }
    }
}

/// Result of a successful command.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Handle(Handle),
    Pair(RawPair),
    Text(String),
    Bool(bool),
    Count(usize),
    None,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BridgeConfig {
    pub teardown: TeardownPolicy,
}

/// Dispatcher plus the registry it owns.
///
/// Not synchronized: a host issuing calls from several threads must
/// serialize them (the C ABI does so with a mutex).
#[derive(Default)]
pub struct Bridge {
    registry: Registry,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> BridgeConfig {
        self.config
    }

    pub fn set_config(&mut self, config: BridgeConfig) {
        self.config = config;
    }

    /// Parses `verb` and runs it.
    pub fn call(&mut self, verb: &str, args: &[Arg]) -> Result<Reply, Error> {
        let verb = Verb::parse(verb)?;
        self.dispatch(verb, args)
    }

    pub fn dispatch(&mut self, verb: Verb, args: &[Arg]) -> Result<Reply, Error> {
        debug!(verb = verb.name(), args = args.len(), "dispatch");
        verb.check_arity(args.len())?;
        match verb {
            Verb::New => {
                let value = match args.first() {
                    Some(arg) => *self.registry.resolve::<Complex>(handle_arg(verb, arg)?)?,
                    None => Complex::default(),
                };
                self.registry.register(value).map(Reply::Handle)
            }
            Verb::NewFromMatlab => {
                let pair = raw_pair_arg(&args[0])?;
                self.registry
                    .register(Complex::from_raw_pair(pair))
                    .map(Reply::Handle)
            }
            Verb::Delete => {
                let handle = handle_arg(verb, &args[0])?;
                self.registry.release(handle)?;
                Ok(Reply::None)
            }
            Verb::IsValid => {
                let handle = handle_arg(verb, &args[0])?;
                Ok(Reply::Bool(self.registry.is_valid_as::<Complex>(handle)))
            }
            Verb::Display => {
                let value = self.registry.resolve::<Complex>(handle_arg(verb, &args[0])?)?;
                Ok(Reply::Text(value.display_string()))
            }
            Verb::Double => {
                let value = self.registry.resolve::<Complex>(handle_arg(verb, &args[0])?)?;
                Ok(Reply::Pair(value.to_raw_pair()))
            }
            Verb::Plus => {
                let (left, right) = self.resolve_two(verb, args)?;
                self.registry.register(left + right).map(Reply::Handle)
            }
            Verb::PlusInPlace => {
                let (_, right) = self.resolve_two(verb, args)?;
                let target = handle_arg(verb, &args[0])?;
                *self.registry.resolve_mut::<Complex>(target)? += right;
                Ok(Reply::None)
            }
            Verb::Count => Ok(Reply::Count(self.registry.len())),
        }
    }

    /// Releases every live handle according to the configured policy.
    pub fn teardown(&mut self) -> Result<TeardownReport, Error> {
        self.registry.teardown(self.config.teardown)
    }

    fn resolve_two(&self, verb: Verb, args: &[Arg]) -> Result<(Complex, Complex), Error> {
        let left = handle_arg(verb, &args[0])?;
        let right = handle_arg(verb, &args[1])?;
        let left = *self.registry.resolve::<Complex>(left)?;
        let right = *self.registry.resolve::<Complex>(right)?;
        Ok((left, right))
    }
}

fn handle_arg(verb: Verb, arg: &Arg) -> Result<Handle, Error> {
    match arg {
        Arg::Handle(handle) => Ok(*handle),
        other => Err(Error::new(ErrorKind::InvalidArgument).with_message(format!(
            "{}: expected a handle, got {}",
            verb.name(),
            other.kind_name()
        ))),
    }
}

fn raw_pair_arg(arg: &Arg) -> Result<RawPair, Error> {
    match arg {
        Arg::Scalar(value) => Ok(RawPair::real(*value)),
        Arg::Array(array) => array.single_pair(),
        other => Err(Error::new(ErrorKind::InvalidArgument).with_message(format!(
            "newFromMatlab: input argument must be of type double, got {}",
            other.kind_name()
        ))),
    }
}
