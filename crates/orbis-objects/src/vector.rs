//! Object vector: the set of objects in a scene, keyed by id.

use std::collections::BTreeMap;

use orbis_core::{Parameter, ParameterRegistry, ParameterType};

use crate::object::{AudioObject, ObjectId};

/// Objects of a scene, iterated in ascending id order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectVector {
    objects: BTreeMap<ObjectId, AudioObject>,
}

impl ObjectVector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object, replacing any object with the same id.
    pub fn insert(&mut self, object: AudioObject) -> Option<AudioObject> {
        self.objects.insert(object.id, object)
    }

    /// Removes an object.
    pub fn remove(&mut self, id: ObjectId) -> Option<AudioObject> {
        self.objects.remove(&id)
    }

    /// Object with the given id.
    pub fn get(&self, id: ObjectId) -> Option<&AudioObject> {
        self.objects.get(&id)
    }

    /// Mutable object with the given id.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut AudioObject> {
        self.objects.get_mut(&id)
    }

    /// True if an object with the id exists.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Objects in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &AudioObject> {
        self.objects.values()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Removes all objects.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Swaps contents with another vector.
    pub fn swap(&mut self, other: &mut ObjectVector) {
        std::mem::swap(&mut self.objects, &mut other.objects);
    }
}

impl<'a> IntoIterator for &'a ObjectVector {
    type Item = &'a AudioObject;
    type IntoIter = std::collections::btree_map::Values<'a, ObjectId, AudioObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.values()
    }
}

impl FromIterator<AudioObject> for ObjectVector {
    fn from_iter<I: IntoIterator<Item = AudioObject>>(iter: I) -> Self {
        let mut v = ObjectVector::new();
        for object in iter {
            v.insert(object);
        }
        v
    }
}

impl Parameter for ObjectVector {
    const TYPE: ParameterType = ParameterType::new("ObjectVector");
}

/// Adds the parameter types of this crate to a registry.
pub fn register_parameters(registry: &mut ParameterRegistry) {
    registry.register(ObjectVector::TYPE, "audio objects of a scene", |_| {
        Box::new(ObjectVector::new())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectKind, Position};
    use orbis_core::{ParameterConfig, ParameterData};

    #[test]
    fn insert_replaces_same_id() {
        let mut v = ObjectVector::new();
        assert!(v.insert(AudioObject::point(5, 0, Position::default())).is_none());
        let old = v.insert(AudioObject::new(5, ObjectKind::DiffuseSource));
        assert!(old.is_some());
        assert_eq!(v.len(), 1);
        assert_eq!(v.get(5).unwrap().kind, ObjectKind::DiffuseSource);
    }

    #[test]
    fn iterates_by_ascending_id() {
        let v: ObjectVector = [9, 2, 4]
            .into_iter()
            .map(|id| AudioObject::new(id, ObjectKind::DiffuseSource))
            .collect();
        assert_eq!(v.ids().collect::<Vec<_>>(), vec![2, 4, 9]);
        assert_eq!((&v).into_iter().count(), 3);
    }

    #[test]
    fn registered_default_is_empty() {
        let mut registry = ParameterRegistry::with_core_types();
        register_parameters(&mut registry);
        let value = registry
            .create(ObjectVector::TYPE, &ParameterConfig::Empty)
            .unwrap();
        let v = value.as_any().downcast_ref::<ObjectVector>().unwrap();
        assert!(v.is_empty());
    }
}
