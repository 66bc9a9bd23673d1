use crate::core::registry::DetectorInstance;
use crate::core::tree::{simple_name, NodeKind};
use fnv::{FnvHashMap, FnvHashSet};

/// Position of a detector instance in the per-project instance list.
pub type Slot = usize;

/// Callback tables for one set of active detectors. Built once per detector
/// set and never mutated; a new set means a new index.
#[derive(Debug, Default)]
pub struct DispatchIndex {
    slots: Vec<Slot>,
    by_kind: FnvHashMap<NodeKind, Vec<Slot>>,
    by_call: FnvHashMap<String, Vec<Slot>>,
    by_super_type: FnvHashMap<String, Vec<Slot>>,
    by_annotation: FnvHashMap<String, Vec<Slot>>,
    relevant_annotations: FnvHashSet<String>,
}

fn push_unique<K: std::hash::Hash + Eq>(map: &mut FnvHashMap<K, Vec<Slot>>, key: K, slot: Slot) {
    let bucket = map.entry(key).or_default();
    if !bucket.contains(&slot) {
        bucket.push(slot);
    }
}

impl DispatchIndex {
    pub fn build(instances: &[DetectorInstance], slots: &[Slot]) -> Self {
        let mut index = Self::default();

        for &slot in slots {
            if index.slots.contains(&slot) {
                continue;
            }
            index.slots.push(slot);
            let detector = instances[slot].detector.as_ref();

            for kind in detector.applicable_node_kinds() {
                push_unique(&mut index.by_kind, *kind, slot);
            }
            for name in detector.applicable_call_names() {
                push_unique(&mut index.by_call, name.to_string(), slot);
            }
            for name in detector.applicable_super_types() {
                push_unique(&mut index.by_super_type, name.to_string(), slot);
            }
            for name in detector.applicable_annotations() {
                push_unique(&mut index.by_annotation, name.to_string(), slot);
                index.relevant_annotations.insert(name.to_string());
            }
        }

        index
    }

    /// Detector slots of this index, in insertion order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn for_kind(&self, kind: NodeKind) -> &[Slot] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn for_call(&self, name: &str) -> &[Slot] {
        self.by_call.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn for_super_type(&self, name: &str) -> &[Slot] {
        self.by_super_type
            .get(name)
            .or_else(|| self.by_super_type.get(simple_name(name)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Annotation buckets accept the qualified name or, failing that, the simple name.
    pub fn for_annotation(&self, name: &str) -> &[Slot] {
        self.by_annotation
            .get(name)
            .or_else(|| self.by_annotation.get(simple_name(name)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_calls(&self) -> bool {
        !self.by_call.is_empty()
    }

    pub fn has_super_types(&self) -> bool {
        !self.by_super_type.is_empty()
    }

    pub fn has_annotations(&self) -> bool {
        !self.by_annotation.is_empty()
    }

    /// Annotation names some detector in this index registered for.
    pub fn relevant_annotations(&self) -> &FnvHashSet<String> {
        &self.relevant_annotations
    }

    pub fn is_relevant_annotation(&self, name: &str) -> bool {
        self.relevant_annotations.contains(name)
            || self.relevant_annotations.contains(simple_name(name))
    }
}
