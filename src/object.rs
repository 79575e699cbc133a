use std::collections::HashMap;

/// Non-owning index into the object pool. Interning guarantees that equal
/// handles mean equal string content and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjHandle(usize);

#[derive(Debug, Clone)]
pub enum Object {
    String(String),
}

/// Owns every object for the lifetime of a compile+run cycle. The intern
/// table maps string content to the pool slot holding it; it never holds
/// two entries with equal content. The pool drains in insertion order when
/// the heap is dropped.
pub struct Heap {
    objects: Vec<Object>,
    strings: HashMap<String, ObjHandle>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            strings: HashMap::new(),
        }
    }

    pub fn intern(&mut self, content: &str) -> ObjHandle {
        if let Some(handle) = self.strings.get(content) {
            return *handle;
        }
        let handle = ObjHandle(self.objects.len());
        self.objects.push(Object::String(content.to_string()));
        self.strings.insert(content.to_string(), handle);
        handle
    }

    pub fn get_str(&self, handle: ObjHandle) -> &str {
        let Object::String(content) = &self.objects[handle.0];
        content
    }

    #[cfg(test)]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_by_content() {
        let mut heap = Heap::new();
        let a = heap.intern("owo");
        let b = heap.intern("owo");
        let c = heap.intern("uwu");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(heap.object_count(), 2);
    }

    #[test]
    fn handles_resolve_to_their_content() {
        let mut heap = Heap::new();
        let h = heap.intern("hello");
        assert_eq!(heap.get_str(h), "hello");
        let empty = heap.intern("");
        assert_eq!(heap.get_str(empty), "");
    }
}
