//! Registration: layers in, action table and composed reducer out.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::action::ActionCreator;
use super::layer::{Effect, Layer, Transition};
use super::namespace::{is_qualified, Namespace, SEPARATOR};

/// An effect bound to the action type its watcher listens for.
#[derive(Debug, Clone)]
pub(crate) struct EffectEntry {
    pub name: String,
    pub kind: String,
    pub effect: Effect,
}

/// Everything derived from a model's layers.
#[derive(Debug)]
pub(crate) struct Registration {
    pub default_state: Value,
    pub types: IndexMap<String, String>,
    pub actions: IndexMap<String, ActionCreator>,
    pub transitions: HashMap<String, Transition>,
    pub effects: Vec<EffectEntry>,
}

/// Merge layers (base first) and derive types, creators and the transition
/// table. Descendant definitions shadow ancestor ones.
pub(crate) fn register(namespace: &Namespace, layers: &[Layer]) -> Registration {
    let mut defaults = Map::new();
    let mut transitions: IndexMap<String, Transition> = IndexMap::new();
    let mut effects: IndexMap<String, Effect> = IndexMap::new();

    for layer in layers.iter().rev() {
        for (key, value) in &layer.default_state {
            if !defaults.contains_key(key) {
                defaults.insert(key.clone(), value.clone());
            }
        }
        for (name, transition) in &layer.transitions {
            transitions
                .entry(name.clone())
                .or_insert_with(|| transition.clone());
        }
        for (name, effect) in &layer.effects {
            effects.entry(name.clone()).or_insert_with(|| effect.clone());
        }
    }

    let mut types = IndexMap::new();
    let mut actions = IndexMap::new();
    let mut by_type = HashMap::new();

    let names: Vec<String> = effects.keys().chain(transitions.keys()).cloned().collect();
    for name in names {
        if !is_well_formed(&name) {
            tracing::debug!(namespace = %namespace, operation = %name, "Ignoring malformed operation name");
            continue;
        }
        let kind = namespace.type_for(&name);
        if !is_qualified(&name) {
            types.insert(name.clone(), kind.clone());
            actions
                .entry(name.clone())
                .or_insert_with(|| ActionCreator::new(kind.clone()));
        }
        if let Some(transition) = transitions.get(&name) {
            by_type.insert(kind, transition.clone());
        }
    }

    let effects = effects
        .into_iter()
        .filter(|(name, _)| is_well_formed(name))
        .map(|(name, effect)| EffectEntry {
            kind: namespace.type_for(&name),
            name,
            effect,
        })
        .collect();

    Registration {
        default_state: Value::Object(defaults),
        types,
        actions,
        transitions: by_type,
        effects,
    }
}

fn is_well_formed(name: &str) -> bool {
    !name.is_empty() && name.split(SEPARATOR).all(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;
    use serde_json::json;

    fn ns(s: &str) -> Namespace {
        Namespace::parse(s).unwrap()
    }

    #[test]
    fn descendant_overrides_ancestor() {
        let base = Layer::new()
            .default_field("a", json!(1))
            .default_field("b", json!(1))
            .transition("set", Transition::new(|_, _| json!("base")))
            .transition("only_base", Transition::new(|_, _| json!("base")));
        let child = Layer::new()
            .default_field("b", json!(2))
            .transition("set", Transition::new(|_, _| json!("child")));

        let reg = register(&ns("m"), &[base, child]);

        assert_eq!(reg.default_state, json!({"a": 1, "b": 2}));
        let set = &reg.transitions["m/set"];
        assert_eq!(set.apply(Value::Null, &Action::new("m/set")), json!("child"));
        assert!(reg.transitions.contains_key("m/only_base"));
    }

    #[test]
    fn qualified_names_register_verbatim_without_creator() {
        let layer = Layer::new()
            .transition("other/clear", Transition::new(|_, _| json!(null)))
            .transition("local", Transition::new(|s, _| s));

        let reg = register(&ns("m"), &[layer]);

        assert!(reg.transitions.contains_key("other/clear"));
        assert!(!reg.types.contains_key("other/clear"));
        assert_eq!(reg.types["local"], "m/local");
        assert_eq!(reg.actions["local"].kind(), "m/local");
    }

    #[test]
    fn malformed_names_are_ignored() {
        let layer = Layer::new()
            .transition("", Transition::new(|s, _| s))
            .transition("bad//name", Transition::new(|s, _| s));

        let reg = register(&ns("m"), &[layer]);

        assert!(reg.types.is_empty());
        assert!(reg.transitions.is_empty());
    }

    #[test]
    fn effect_and_transition_share_type() {
        let layer = Layer::new()
            .transition("go", Transition::new(|s, _| s))
            .effect("go", Effect::new(|_, _| async { Ok(()) }));

        let reg = register(&ns("m"), &[layer]);

        assert_eq!(reg.types.len(), 1);
        assert_eq!(reg.effects.len(), 1);
        assert_eq!(reg.effects[0].kind, "m/go");
        assert!(reg.transitions.contains_key("m/go"));
    }
}
