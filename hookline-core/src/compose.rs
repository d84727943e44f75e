//! Component Composition
//!
//! A component is anything that can build a [`NodeSpec`]. Higher-order
//! wrapping is plain composition: a [`Wrapper`] takes a component and returns
//! a new component whose node carries the wrapper's effects and values and
//! renders the wrapped node as its only child.
//!
//! ```rust,ignore
//! let with_logging = Wrapper::new("withLogging").effect(EffectSpec::always("log"));
//! let counter = || NodeSpec::new("Counter").value("count", 0);
//!
//! let spec = with_logging.wrap(counter).build();
//! assert_eq!(spec.label(), "withLogging(Counter)");
//! ```

use indexmap::IndexMap;

use crate::graph::NodeSpec;
use crate::reactive::{DepValue, EffectSpec};

/// Something that produces a node description.
pub trait Component {
    fn build(&self) -> NodeSpec;
}

impl<F> Component for F
where
    F: Fn() -> NodeSpec,
{
    fn build(&self) -> NodeSpec {
        self()
    }
}

/// Template for a wrapping component.
#[derive(Debug, Clone)]
pub struct Wrapper {
    name: String,
    values: IndexMap<String, DepValue>,
    effects: Vec<EffectSpec>,
}

impl Wrapper {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: IndexMap::new(),
            effects: Vec::new(),
        }
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<DepValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn effect(mut self, effect: EffectSpec) -> Self {
        self.effects.push(effect);
        self
    }

    /// Wrap `inner`, producing a new component.
    pub fn wrap<C: Component>(&self, inner: C) -> Wrapped<C> {
        Wrapped {
            wrapper: self.clone(),
            inner,
        }
    }
}

/// A component wrapped by a [`Wrapper`]. Wrapping again nests further.
#[derive(Debug, Clone)]
pub struct Wrapped<C> {
    wrapper: Wrapper,
    inner: C,
}

impl<C: Component> Component for Wrapped<C> {
    fn build(&self) -> NodeSpec {
        let inner = self.inner.build();
        let label = format!("{}({})", self.wrapper.name, inner.label());

        let mut outer = NodeSpec::new(label);
        for (key, value) in &self.wrapper.values {
            outer = outer.value(key.clone(), value.clone());
        }
        for effect in &self.wrapper.effects {
            outer = outer.effect(effect.clone());
        }
        outer.child(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> NodeSpec {
        NodeSpec::new("Counter").effect(EffectSpec::on("sync", ["count"]))
    }

    #[test]
    fn wrapper_names_after_inner() {
        let spec = Wrapper::new("withTheme").value("theme", "dark").wrap(counter).build();

        assert_eq!(spec.label(), "withTheme(Counter)");
        assert_eq!(spec.children().len(), 1);
        assert_eq!(spec.children()[0].label(), "Counter");
    }

    #[test]
    fn wrapping_nests() {
        let logged = Wrapper::new("withLogging").effect(EffectSpec::always("log"));
        let themed = Wrapper::new("withTheme");

        let spec = logged.wrap(themed.wrap(counter)).build();
        assert_eq!(spec.label(), "withLogging(withTheme(Counter))");
        assert_eq!(spec.effects().len(), 1);
        assert_eq!(spec.children()[0].children()[0].label(), "Counter");
    }

    #[test]
    fn each_build_is_independent() {
        let component = Wrapper::new("memo").wrap(counter);
        let first = component.build();
        let second = component.build();
        assert_eq!(first.label(), second.label());
    }
}
