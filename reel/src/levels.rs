//! Frame-indexed analysis data exposed to scripts.
//!
//! The media analysis that produces levels lives outside this crate. Scripts
//! only ever see a provider as an opaque value bound to [`LEVELS_SYMBOL`] and
//! query it through the `levels` family of natives.
use crate::{
    env::Env,
    number::Number,
    value::{Host, Value},
};
use std::{collections::HashMap, rc::Rc};
use thiserror::Error;

/// Symbol the provider is bound to.
pub const LEVELS_SYMBOL: &str = "@levels";
/// Symbol the provider's frame rate is bound to.
pub const TIMEBASE_SYMBOL: &str = "timebase";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LevelsError {
    #[error("levels: unknown kind '{0}'")]
    UnknownKind(String),
    #[error("levels: {kind} has no stream {stream}")]
    NoStream { kind: String, stream: usize },
    #[error("levels: expected a levels provider, got {0}")]
    NotAProvider(String),
}

/// One value per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Levels {
    Bools(Vec<bool>),
    Numbers(Vec<Number>),
}

impl Levels {
    pub fn len(&self) -> usize {
        match self {
            Self::Bools(b) => b.len(),
            Self::Numbers(n) => n.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Levels> for Value {
    fn from(levels: Levels) -> Self {
        match levels {
            Levels::Bools(b) => Value::List(b.into_iter().map(Value::Bool).collect()),
            Levels::Numbers(n) => Value::List(n.into_iter().map(Value::Number).collect()),
        }
    }
}

pub trait LevelsProvider {
    /// Frames per second of every array this provider returns.
    fn timebase(&self) -> Number;

    /// Number of frames in the timeline.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up the `stream`th array of `kind`, e.g. `("silence", 0)`.
    fn levels(&self, kind: &str, stream: usize) -> Result<Levels, LevelsError>;
}

/// Levels computed ahead of time and held in memory.
#[derive(Debug, Clone)]
pub struct FrameLevels {
    timebase: Number,
    len: usize,
    kinds: HashMap<String, Vec<Levels>>,
}

impl FrameLevels {
    pub fn new(timebase: Number) -> Self {
        Self {
            timebase,
            len: 0,
            kinds: HashMap::new(),
        }
    }

    /// Adds the next stream of `kind`.
    pub fn with_stream(mut self, kind: &str, levels: Levels) -> Self {
        self.len = self.len.max(levels.len());
        self.kinds.entry(kind.to_owned()).or_default().push(levels);
        self
    }
}

impl LevelsProvider for FrameLevels {
    fn timebase(&self) -> Number {
        self.timebase.clone()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn levels(&self, kind: &str, stream: usize) -> Result<Levels, LevelsError> {
        let streams = self
            .kinds
            .get(kind)
            .ok_or_else(|| LevelsError::UnknownKind(kind.to_owned()))?;
        streams
            .get(stream)
            .cloned()
            .ok_or_else(|| LevelsError::NoStream {
                kind: kind.to_owned(),
                stream,
            })
    }
}

/// What an opaque levels value holds.
#[derive(Clone)]
pub struct LevelsHandle(Rc<dyn LevelsProvider>);

impl LevelsHandle {
    pub fn new(provider: impl LevelsProvider + 'static) -> Self {
        Self(Rc::new(provider))
    }

    pub fn provider(&self) -> &dyn LevelsProvider {
        self.0.as_ref()
    }

    /// Extracts the provider from an argument passed to a native.
    pub fn from_value(value: &Value) -> Result<&Self, LevelsError> {
        let handle = match value {
            Value::Opaque(host) => host.downcast_ref::<Self>(),
            _ => None,
        };
        handle.ok_or_else(|| LevelsError::NotAProvider(value.to_string()))
    }
}

impl From<LevelsHandle> for Value {
    fn from(handle: LevelsHandle) -> Self {
        Value::Opaque(Host::new("levels", handle))
    }
}

/// Binds `provider` to [`LEVELS_SYMBOL`] and its timebase to
/// [`TIMEBASE_SYMBOL`].
pub fn bind_levels(env: &mut Env, provider: impl LevelsProvider + 'static) {
    let handle = LevelsHandle::new(provider);
    env.define(TIMEBASE_SYMBOL, Value::Number(handle.provider().timebase()));
    env.define(LEVELS_SYMBOL, handle.into());
}
