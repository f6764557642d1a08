use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Globally unique script identity. Authoring surfaces mint these through
/// [`ScriptIdAllocator`] or supply their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptId(String);

impl ScriptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScriptId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScriptId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Motion,
    Looks,
    Control,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Motion => "motion",
            Category::Looks => "looks",
            Category::Control => "control",
        }
    }
}

/// Parameter payload. `Scripts` only shows up under `repeat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Scripts(Vec<Script>),
}

impl ParamValue {
    /// Numbers and numeric strings both count; non-finite values do not.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            ParamValue::Number(n) => *n,
            ParamValue::Text(text) => text.trim().parse::<f64>().ok()?,
            ParamValue::Scripts(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_scripts(&self) -> Option<&[Script]> {
        match self {
            ParamValue::Scripts(scripts) => Some(scripts.as_slice()),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Vec<Script>> for ParamValue {
    fn from(value: Vec<Script>) -> Self {
        ParamValue::Scripts(value)
    }
}

pub type Params = BTreeMap<String, ParamValue>;

/// One executable block of an actor's program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: ScriptId,
    #[serde(rename = "type", alias = "category")]
    pub category: Category,
    pub action: String,
    #[serde(default)]
    pub params: Params,
}

impl Script {
    pub fn new(id: impl Into<ScriptId>, category: Category, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            action: action.into(),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn block(&self) -> Option<Block> {
        self.action.parse().ok()
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(ParamValue::as_number)
    }

    /// Missing or malformed numbers degrade to zero so playback never stalls.
    pub fn number_or_zero(&self, name: &str) -> f64 {
        self.number(name).unwrap_or(0.0)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(ParamValue::as_text)
    }

    /// Text as written, numbers in their shortest form (`42`, `1.5`), anything
    /// else empty.
    pub fn label(&self, name: &str) -> String {
        match self.params.get(name) {
            Some(ParamValue::Text(text)) => text.clone(),
            Some(ParamValue::Number(value)) => value.to_string(),
            _ => String::new(),
        }
    }

    pub fn nested(&self, name: &str) -> &[Script] {
        self.params
            .get(name)
            .and_then(ParamValue::as_scripts)
            .unwrap_or(&[])
    }

    pub fn is_move(&self) -> bool {
        self.action == Block::Move.tag()
    }

    /// Flips the sign of `steps` on a `move`. Returns false when there was
    /// nothing numeric to flip.
    pub(crate) fn negate_steps(&mut self) -> bool {
        if !self.is_move() {
            return false;
        }
        match self.number("steps") {
            Some(steps) => {
                self.params
                    .insert("steps".to_string(), ParamValue::Number(-steps));
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown block `{0}`")]
pub struct ParseBlockError(pub String);

/// Palette entries the authoring surface offers, with their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    Move,
    TurnLeft,
    TurnRight,
    GoTo,
    Say,
    Think,
    Repeat,
}

impl Block {
    pub const ALL: [Block; 7] = [
        Block::Move,
        Block::TurnLeft,
        Block::TurnRight,
        Block::GoTo,
        Block::Say,
        Block::Think,
        Block::Repeat,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Block::Move => "move",
            Block::TurnLeft => "turn-left",
            Block::TurnRight => "turn-right",
            Block::GoTo => "goto",
            Block::Say => "say",
            Block::Think => "think",
            Block::Repeat => "repeat",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Block::Move | Block::TurnLeft | Block::TurnRight | Block::GoTo => Category::Motion,
            Block::Say | Block::Think => Category::Looks,
            Block::Repeat => Category::Control,
        }
    }

    pub fn default_params(self) -> Params {
        let mut params = Params::new();
        match self {
            Block::Move => {
                params.insert("steps".into(), ParamValue::Number(10.0));
            }
            Block::TurnLeft | Block::TurnRight => {
                params.insert("degrees".into(), ParamValue::Number(15.0));
            }
            Block::GoTo => {
                params.insert("x".into(), ParamValue::Number(0.0));
                params.insert("y".into(), ParamValue::Number(0.0));
            }
            Block::Say | Block::Think => {
                params.insert("message".into(), ParamValue::Text(String::new()));
                params.insert("duration".into(), ParamValue::Number(2.0));
            }
            Block::Repeat => {
                params.insert("count".into(), ParamValue::Number(10.0));
                params.insert("scripts".into(), ParamValue::Scripts(Vec::new()));
            }
        }
        params
    }

    pub fn instantiate(self, id: impl Into<ScriptId>) -> Script {
        Script {
            id: id.into(),
            category: self.category(),
            action: self.tag().to_string(),
            params: self.default_params(),
        }
    }

    /// Builds a script from the palette defaults, then applies `overrides`.
    pub fn instantiate_with<I>(self, id: impl Into<ScriptId>, overrides: I) -> Script
    where
        I: IntoIterator<Item = (String, ParamValue)>,
    {
        let mut script = self.instantiate(id);
        script.params.extend(overrides);
        script
    }
}

impl FromStr for Block {
    type Err = ParseBlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Block::ALL
            .into_iter()
            .find(|block| block.tag() == s)
            .ok_or_else(|| ParseBlockError(s.to_string()))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Hands out `script-{n}` ids in increasing order. Once `script-{u64::MAX}`
/// has been handed out or observed, no further ids are minted.
#[derive(Debug, Clone)]
pub struct ScriptIdAllocator {
    next: Option<u64>,
}

impl Default for ScriptIdAllocator {
    fn default() -> Self {
        Self { next: Some(1) }
    }
}

impl ScriptIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` once the counter is exhausted.
    pub fn allocate(&mut self) -> Option<ScriptId> {
        let n = self.next?;
        self.next = n.checked_add(1);
        Some(ScriptId(format!("script-{n}")))
    }

    /// Skips past an id minted elsewhere so the two sources never collide.
    pub fn observe(&mut self, id: &ScriptId) {
        let Some(n) = id
            .as_str()
            .strip_prefix("script-")
            .and_then(|suffix| suffix.parse::<u64>().ok())
        else {
            return;
        };
        if let Some(next) = self.next {
            if n >= next {
                self.next = n.checked_add(1);
            }
        }
    }
}
