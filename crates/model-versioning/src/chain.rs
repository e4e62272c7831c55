use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde_json::{Map, Value};

use crate::converter::ModelConverter;
use crate::error::ConverterError;

/// A single conversion between two named versions.
///
/// Steps may connect adjacent versions (`1.0 -> 1.1`) or jump across
/// several (`1.0 -> 2.0`). Each step must be deterministic and pure.
pub trait ConversionStep: Send + Sync {
    /// Version the step reads.
    fn source_version(&self) -> &str;
    /// Version the step produces.
    fn target_version(&self) -> &str;
    /// Transform the tree from source to target version.
    fn apply(&self, tree: Map<String, Value>) -> Result<Map<String, Value>, ConverterError>;
}

/// Which side of the chain a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Read path, toward the current version.
    Upgrade,
    /// Write path, away from the current version.
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upgrade => write!(f, "upgrade"),
            Self::Downgrade => write!(f, "downgrade"),
        }
    }
}

/// A converter that walks registered steps from one version to another.
///
/// Upgrade steps serve [`ModelConverter::to_current`], downgrade steps serve
/// [`ModelConverter::to_target`]. When asked to go from `a` to `b`, the chain
/// runs the shortest sequence of steps leading there, so a direct `a -> b`
/// step wins and dead-end branches are skipped.
///
/// # Example
///
/// ```
/// use model_versioning::{ConversionStep, ConverterError, ModelConverter, StepChain};
/// use serde_json::{json, Map, Value};
///
/// struct AddEmail;
///
/// impl ConversionStep for AddEmail {
///     fn source_version(&self) -> &str { "1" }
///     fn target_version(&self) -> &str { "2" }
///     fn apply(&self, mut tree: Map<String, Value>) -> Result<Map<String, Value>, ConverterError> {
///         tree.entry("email").or_insert(json!(null));
///         Ok(tree)
///     }
/// }
///
/// let mut chain = StepChain::new("users");
/// chain.register_upgrade(Box::new(AddEmail));
///
/// let tree = chain.to_current(Map::new(), "1", "2").unwrap();
/// assert_eq!(tree["email"], json!(null));
/// ```
pub struct StepChain {
    name: String,
    upgrades: Vec<Box<dyn ConversionStep>>,
    downgrades: Vec<Box<dyn ConversionStep>>,
}

impl StepChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upgrades: Vec::new(),
            downgrades: Vec::new(),
        }
    }

    /// Register a step used on the read path.
    pub fn register_upgrade(&mut self, step: Box<dyn ConversionStep>) {
        self.upgrades.push(step);
    }

    /// Register a step used on the write path.
    pub fn register_downgrade(&mut self, step: Box<dyn ConversionStep>) {
        self.downgrades.push(step);
    }

    /// Builder form of [`register_upgrade`](Self::register_upgrade).
    pub fn with_upgrade(mut self, step: impl ConversionStep + 'static) -> Self {
        self.register_upgrade(Box::new(step));
        self
    }

    /// Builder form of [`register_downgrade`](Self::register_downgrade).
    pub fn with_downgrade(mut self, step: impl ConversionStep + 'static) -> Self {
        self.register_downgrade(Box::new(step));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.upgrades.is_empty() && self.downgrades.is_empty()
    }

    /// List all registered steps as `(direction, from, to)`.
    pub fn registered_steps(&self) -> Vec<(Direction, String, String)> {
        let list = |dir: Direction, steps: &[Box<dyn ConversionStep>]| {
            steps
                .iter()
                .map(move |s| {
                    (
                        dir,
                        s.source_version().to_string(),
                        s.target_version().to_string(),
                    )
                })
                .collect::<Vec<_>>()
        };
        let mut out = list(Direction::Upgrade, &self.upgrades);
        out.extend(list(Direction::Downgrade, &self.downgrades));
        out
    }

    /// Versions the chain can read or write, in registration order.
    pub fn known_versions(&self, direction: Direction) -> Vec<String> {
        let mut versions: Vec<String> = Vec::new();
        for step in self.steps(direction) {
            for v in [step.source_version(), step.target_version()] {
                if !versions.iter().any(|known| known == v) {
                    versions.push(v.to_string());
                }
            }
        }
        versions
    }

    /// Check that `from` reaches `to` in the given direction without
    /// running any step.
    pub fn validate_path(&self, direction: Direction, from: &str, to: &str) -> Result<(), ConverterError> {
        self.plan(direction, from, to).map(|_| ())
    }

    fn steps(&self, direction: Direction) -> &[Box<dyn ConversionStep>] {
        match direction {
            Direction::Upgrade => &self.upgrades,
            Direction::Downgrade => &self.downgrades,
        }
    }

    /// Indices of the steps to run, in order: the shortest path from `from`
    /// to `to`, ties going to the earliest registered step.
    fn plan(&self, direction: Direction, from: &str, to: &str) -> Result<Vec<usize>, ConverterError> {
        if from == to {
            return Ok(Vec::new());
        }

        let steps = self.steps(direction);
        // Step that first reached each version; `None` for the start.
        let mut reached: HashMap<&str, Option<usize>> = HashMap::from([(from, None)]);
        let mut queue = VecDeque::from([from]);
        let mut dead_end = None;
        let mut found = false;

        'search: while let Some(version) = queue.pop_front() {
            let mut leaves = false;
            for (index, step) in steps.iter().enumerate() {
                if step.source_version() != version {
                    continue;
                }
                leaves = true;
                let next = step.target_version();
                if reached.contains_key(next) {
                    continue;
                }
                reached.insert(next, Some(index));
                if next == to {
                    found = true;
                    break 'search;
                }
                queue.push_back(next);
            }
            if !leaves && dead_end.is_none() {
                dead_end = Some(version);
            }
        }

        if !found {
            let reason = match dead_end {
                Some(version) => format!("{direction} chain '{}' has no step from {version}", self.name),
                None => format!("{direction} chain '{}' loops without reaching {to}", self.name),
            };
            return Err(ConverterError::new(from, to, reason));
        }

        let mut path = Vec::new();
        let mut version = to;
        while let Some(Some(index)) = reached.get(version) {
            path.push(*index);
            version = steps[*index].source_version();
        }
        path.reverse();
        Ok(path)
    }

    fn run(
        &self,
        direction: Direction,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        let steps = self.steps(direction);
        let mut tree = tree;
        for index in self.plan(direction, from, to)? {
            let step = &steps[index];
            tracing::trace!(
                chain = %self.name,
                %direction,
                from = step.source_version(),
                to = step.target_version(),
                "applying conversion step"
            );
            tree = step.apply(tree)?;
        }
        Ok(tree)
    }
}

impl ModelConverter for StepChain {
    fn to_current(
        &self,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        self.run(Direction::Upgrade, tree, from, to)
    }

    fn to_target(
        &self,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        self.run(Direction::Downgrade, tree, from, to)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for StepChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepChain")
            .field("name", &self.name)
            .field("steps", &self.registered_steps())
            .finish()
    }
}
