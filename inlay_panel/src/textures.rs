// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! External texture bookkeeping.

use hashbrown::HashMap;

use crate::engine::TextureId;

/// Maps engine-facing texture identifiers to host-native handles.
///
/// Identifiers increase from 1 and are never reused within a registry.
#[derive(Debug)]
pub struct TextureRegistry {
    next: i64,
    handles: HashMap<TextureId, usize>,
}

impl Default for TextureRegistry {
    fn default() -> Self {
        Self {
            next: 1,
            handles: HashMap::new(),
        }
    }
}

impl TextureRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `handle` and returns its new identifier.
    pub fn register(&mut self, handle: usize) -> TextureId {
        let id = TextureId(self.next);
        self.next += 1;
        self.handles.insert(id, handle);
        id
    }

    /// Forgets `id`, returning its handle if it was registered.
    pub fn unregister(&mut self, id: TextureId) -> Option<usize> {
        self.handles.remove(&id)
    }

    /// Returns the native handle for `id`.
    #[must_use]
    pub fn handle(&self, id: TextureId) -> Option<usize> {
        self.handles.get(&id).copied()
    }

    /// Returns the number of registered textures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Forgets every texture. Identifiers keep increasing.
    pub fn clear(&mut self) -> usize {
        let count = self.handles.len();
        self.handles.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_increase_from_one() {
        let mut registry = TextureRegistry::new();
        let a = registry.register(0x10);
        let b = registry.register(0x20);
        assert_eq!((a, b), (TextureId(1), TextureId(2)));
        assert_eq!(registry.handle(b), Some(0x20));
    }

    #[test]
    fn identifiers_are_not_reused() {
        let mut registry = TextureRegistry::new();
        let a = registry.register(0x10);
        assert_eq!(registry.unregister(a), Some(0x10));
        assert_eq!(registry.unregister(a), None, "second unregister is a no-op");
        assert_eq!(registry.clear(), 0);
        assert_eq!(registry.register(0x10), TextureId(2));
    }
}
