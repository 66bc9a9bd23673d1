use crate::config::Configuration;
use crate::core::catalog::{IssueCatalog, INTERNAL_DETECTOR};
use crate::core::dispatch::Slot;
use crate::core::error::{panic_message, DetectorError};
use crate::detectors::Detector;
use crate::models::{Scope, ScopeSet};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

pub type DetectorFactory = Box<dyn Fn() -> Result<Box<dyn Detector>, DetectorError>>;

/// A live detector and the key it was created under.
pub struct DetectorInstance {
    pub key: String,
    pub detector: Box<dyn Detector>,
}

impl DetectorInstance {
    pub fn new(key: &str, detector: Box<dyn Detector>) -> Self {
        Self {
            key: key.to_string(),
            detector,
        }
    }
}

impl fmt::Debug for DetectorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorInstance")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Detector slots recorded under each scope they asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeMap {
    by_scope: BTreeMap<Scope, Vec<Slot>>,
}

impl ScopeMap {
    fn record(&mut self, scopes: ScopeSet, slot: Slot) {
        for scope in scopes.iter() {
            let slots = self.by_scope.entry(scope).or_default();
            if !slots.contains(&slot) {
                slots.push(slot);
            }
        }
    }

    /// Slots registered under any of `scopes`, in slot order.
    pub fn slots_for(&self, scopes: ScopeSet) -> Vec<Slot> {
        let mut slots: Vec<Slot> = scopes
            .iter()
            .filter_map(|scope| self.by_scope.get(&scope))
            .flatten()
            .copied()
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    pub fn all_slots(&self) -> Vec<Slot> {
        self.slots_for(ScopeSet::ALL)
    }

    pub fn is_empty(&self) -> bool {
        self.by_scope.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct DetectorSelection {
    pub instances: Vec<DetectorInstance>,
    pub scope_map: ScopeMap,
}

/// Detector factories by key. Plugins fill it; the scheduler asks it for
/// the detectors a run needs.
#[derive(Default)]
pub struct DetectorRegistry {
    factories: Vec<(String, DetectorFactory)>,
    by_key: HashMap<String, usize>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and keeps the existing factory when `key` is taken.
    pub fn register(&mut self, key: &str, factory: DetectorFactory) -> bool {
        if self.by_key.contains_key(key) {
            warn!(detector = key, "Detector key already registered; ignoring");
            return false;
        }
        self.by_key.insert(key.to_string(), self.factories.len());
        self.factories.push((key.to_string(), factory));
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(key, _)| key.as_str())
    }

    /// Get the number of registered detector keys
    pub fn count(&self) -> usize {
        self.factories.len()
    }

    /// Runs the factory for `key`. A failing or panicking factory is logged
    /// and yields `None`.
    pub fn instantiate(&self, key: &str) -> Option<Box<dyn Detector>> {
        let Some(index) = self.by_key.get(key) else {
            warn!(detector = key, "No factory registered for detector; skipping its issues");
            return None;
        };
        let factory = &self.factories[*index].1;
        match panic::catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(Ok(detector)) => Some(detector),
            Ok(Err(e)) => {
                warn!(detector = key, error = %e, "Detector factory failed; skipping");
                None
            }
            Err(payload) => {
                warn!(
                    detector = key,
                    "Detector factory panicked; skipping: {}",
                    panic_message(payload.as_ref())
                );
                None
            }
        }
    }

    /// One instance per detector key with at least one enabled issue that
    /// can run under `scope`.
    pub fn select_detectors(
        &self,
        catalog: &IssueCatalog,
        scope: ScopeSet,
        configuration: &dyn Configuration,
    ) -> DetectorSelection {
        let mut selection = DetectorSelection::default();
        let mut slot_by_key: HashMap<&str, Slot> = HashMap::new();
        let mut detector_scopes: Vec<ScopeSet> = Vec::new();
        let mut unavailable: HashSet<&str> = HashSet::new();

        for issue in catalog.issues() {
            let key = issue.detector_key();
            if key == INTERNAL_DETECTOR || unavailable.contains(key) {
                continue;
            }
            if !issue.implementation.is_adequate(scope) || !configuration.is_enabled(issue) {
                continue;
            }

            let slot = match slot_by_key.get(key) {
                Some(slot) => *slot,
                None => {
                    let Some(detector) = self.instantiate(key) else {
                        unavailable.insert(key);
                        continue;
                    };
                    let slot = selection.instances.len();
                    selection.instances.push(DetectorInstance::new(key, detector));
                    detector_scopes.push(ScopeSet::EMPTY);
                    slot_by_key.insert(key, slot);
                    slot
                }
            };
            detector_scopes[slot] = detector_scopes[slot].union(issue.implementation.scope);
        }

        for (slot, scopes) in detector_scopes.into_iter().enumerate() {
            selection.scope_map.record(scopes, slot);
        }

        debug!(
            detectors = selection.instances.len(),
            scope = ?scope,
            "Selected detectors"
        );
        selection
    }
}

/// Scope map for a repeated phase: only the `requested` instances, each kept
/// while one of its issues is still enabled, under the union of those issues'
/// scopes. The phase scope narrows which artifacts they see, not whether
/// they run. No detector is constructed.
pub fn select_repeating(
    catalog: &IssueCatalog,
    instances: &[DetectorInstance],
    requested: &[Slot],
    configuration: &dyn Configuration,
) -> ScopeMap {
    let mut scope_map = ScopeMap::default();
    for &slot in requested {
        let Some(instance) = instances.get(slot) else {
            continue;
        };
        let scopes = catalog
            .issues_for_detector(&instance.key)
            .filter(|issue| configuration.is_enabled(issue))
            .fold(ScopeSet::EMPTY, |acc, issue| acc.union(issue.implementation.scope));
        scope_map.record(scopes, slot);
    }
    scope_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DefaultConfiguration, ProjectConfiguration};
    use crate::core::catalog::Categories;
    use crate::models::scope::{CLASS_FILE_SCOPE, SOURCE_FILE_SCOPE};
    use crate::models::{Implementation, Issue, Severity};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Noop;

    impl Detector for Noop {}

    fn issue(id: &str, key: &str, scope: ScopeSet) -> Issue {
        Issue::new(
            id,
            id,
            "",
            &Categories::standard().correctness,
            5,
            Severity::Warning,
            Implementation::new(key, scope),
        )
    }

    fn counting_factory(counter: Rc<Cell<usize>>) -> DetectorFactory {
        Box::new(move || {
            counter.set(counter.get() + 1);
            Ok(Box::new(Noop) as Box<dyn Detector>)
        })
    }

    #[test]
    fn test_one_instance_per_detector_key() {
        let mut builder = IssueCatalog::builder();
        builder
            .add(issue("First", "shared", SOURCE_FILE_SCOPE))
            .add(issue("Second", "shared", CLASS_FILE_SCOPE))
            .add(issue("Other", "other", SOURCE_FILE_SCOPE));
        let catalog = builder.build();

        let created = Rc::new(Cell::new(0));
        let mut registry = DetectorRegistry::new();
        registry.register("shared", counting_factory(created.clone()));
        registry.register("other", counting_factory(Rc::new(Cell::new(0))));

        let scope = SOURCE_FILE_SCOPE.union(CLASS_FILE_SCOPE);
        let selection = registry.select_detectors(&catalog, scope, &DefaultConfiguration);

        assert_eq!(created.get(), 1);
        assert_eq!(selection.instances.len(), 2);
        assert_eq!(selection.instances[0].key, "shared");
        assert_eq!(selection.scope_map.slots_for(CLASS_FILE_SCOPE), vec![0]);
        assert_eq!(selection.scope_map.slots_for(SOURCE_FILE_SCOPE), vec![0, 1]);
    }

    #[test]
    fn test_inadequate_and_disabled_issues_are_not_selected() {
        let mut builder = IssueCatalog::builder();
        builder
            .add(issue("NeedsClasses", "classes", CLASS_FILE_SCOPE))
            .add(issue("Turned", "off", SOURCE_FILE_SCOPE))
            .add(Issue::new(
                "Partial",
                "Partial",
                "",
                &Categories::standard().correctness,
                5,
                Severity::Warning,
                Implementation::new("partial", SOURCE_FILE_SCOPE.union(CLASS_FILE_SCOPE))
                    .with_analysis_scope(SOURCE_FILE_SCOPE),
            ));
        let catalog = builder.build();

        let mut registry = DetectorRegistry::new();
        for key in ["classes", "off", "partial"] {
            registry.register(key, counting_factory(Rc::new(Cell::new(0))));
        }
        let config: Config = toml::from_str(r#"disable = ["Turned"]"#).expect("config");
        let configuration = ProjectConfiguration::new(&config);

        let selection = registry.select_detectors(&catalog, SOURCE_FILE_SCOPE, &configuration);
        let keys: Vec<&str> = selection.instances.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["partial"]);

        let everything = registry.select_detectors(&catalog, ScopeSet::ALL, &configuration);
        assert_eq!(everything.instances.len(), 2);
    }

    #[test]
    fn test_failing_factories_are_skipped() {
        let mut builder = IssueCatalog::builder();
        builder
            .add(issue("Broken", "broken", SOURCE_FILE_SCOPE))
            .add(issue("Panics", "panics", SOURCE_FILE_SCOPE))
            .add(issue("Missing", "missing", SOURCE_FILE_SCOPE))
            .add(issue("Fine", "fine", SOURCE_FILE_SCOPE));
        let catalog = builder.build();

        let mut registry = DetectorRegistry::new();
        registry.register(
            "broken",
            Box::new(|| -> Result<Box<dyn Detector>, DetectorError> {
                Err(DetectorError::failed("no config"))
            }),
        );
        registry.register(
            "panics",
            Box::new(|| -> Result<Box<dyn Detector>, DetectorError> { panic!("factory exploded") }),
        );
        registry.register("fine", counting_factory(Rc::new(Cell::new(0))));

        let selection = registry.select_detectors(&catalog, ScopeSet::ALL, &DefaultConfiguration);
        assert_eq!(selection.instances.len(), 1);
        assert_eq!(selection.instances[0].key, "fine");
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = DetectorRegistry::new();
        assert!(registry.register("a", counting_factory(Rc::new(Cell::new(0)))));
        assert!(!registry.register("a", counting_factory(Rc::new(Cell::new(0)))));
        assert_eq!(registry.count(), 1);
        assert!(registry.contains("a"));
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_repeat_selection_reuses_requested_instances() {
        let mut builder = IssueCatalog::builder();
        builder
            .add(issue("A", "a", CLASS_FILE_SCOPE))
            .add(issue("B", "b", SOURCE_FILE_SCOPE));
        let catalog = builder.build();
        let instances = vec![
            DetectorInstance::new("a", Box::new(Noop)),
            DetectorInstance::new("b", Box::new(Noop)),
        ];

        let map = select_repeating(&catalog, &instances, &[0], &DefaultConfiguration);
        assert_eq!(map.all_slots(), vec![0]);
        assert_eq!(map.slots_for(CLASS_FILE_SCOPE), vec![0]);

        let both = select_repeating(&catalog, &instances, &[0, 1], &DefaultConfiguration);
        assert_eq!(both.slots_for(SOURCE_FILE_SCOPE), vec![1]);
    }

    #[test]
    fn test_repeat_selection_keeps_wide_issue_for_narrow_hint() {
        let mut builder = IssueCatalog::builder();
        builder.add(issue("Wide", "wide", SOURCE_FILE_SCOPE.union(CLASS_FILE_SCOPE)));
        let catalog = builder.build();
        let instances = vec![DetectorInstance::new("wide", Box::new(Noop))];

        let map = select_repeating(&catalog, &instances, &[0], &DefaultConfiguration);
        assert_eq!(map.slots_for(CLASS_FILE_SCOPE), vec![0]);
    }

    #[test]
    fn test_repeat_selection_drops_disabled_detectors() {
        let mut builder = IssueCatalog::builder();
        builder.add(issue("Gone", "gone", CLASS_FILE_SCOPE));
        let catalog = builder.build();
        let instances = vec![DetectorInstance::new("gone", Box::new(Noop))];
        let config: Config = toml::from_str(r#"disable = ["Gone"]"#).expect("config");
        let configuration = ProjectConfiguration::new(&config);

        assert!(select_repeating(&catalog, &instances, &[0], &configuration).is_empty());
    }
}
