//! Deep copying of object graphs.
//!
//! A [`Copier`] reads from one document and produces fresh objects for
//! another (or the same) document. Every source object is copied at most
//! once per copier, so sharing inside the copied graph is preserved and
//! cycles terminate. Copied objects are staged and only inserted by
//! [`Copier::commit`], which lets callers validate before touching the
//! destination.

use crate::document::Document;
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::{HashMap, VecDeque};

/// Staged deep copy from a source document.
#[derive(Debug)]
pub struct Copier<'a> {
    source: &'a Document,
    next_id: u32,
    map: HashMap<ObjectRef, ObjectRef>,
    pending: VecDeque<(ObjectRef, ObjectRef)>,
    staged: Vec<(ObjectRef, Object)>,
}

/// Tree links that must not be followed when copying a page.
fn skip_key(dict: &Dictionary, key: &str) -> bool {
    key == "Parent" && matches!(dict.get("Type").and_then(Object::as_name), Some("Page" | "Pages"))
}

impl<'a> Copier<'a> {
    /// Copy out of `source`, numbering new objects from `first_id`.
    pub fn new(source: &'a Document, first_id: u32) -> Self {
        Self {
            source,
            next_id: first_id.max(1),
            map: HashMap::new(),
            pending: VecDeque::new(),
            staged: Vec::new(),
        }
    }

    /// The next object number this copier would hand out. Objects still
    /// scheduled may claim more numbers until [`Copier::drain`] runs.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Allocate a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let r = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        r
    }

    /// Map `source_ref` to a fresh number without copying its object; the
    /// caller supplies the object later through [`Copier::define`].
    pub fn reserve(&mut self, source_ref: ObjectRef) -> ObjectRef {
        if let Some(&r) = self.map.get(&source_ref) {
            return r;
        }
        let r = self.allocate();
        self.map.insert(source_ref, r);
        r
    }

    /// Keep references to `source_ref` pointing at the original object.
    /// Only meaningful when copying within one document.
    pub fn share(&mut self, source_ref: ObjectRef) {
        self.map.entry(source_ref).or_insert(source_ref);
    }

    /// Stage an object for a number obtained from this copier.
    pub fn define(&mut self, r: ObjectRef, obj: Object) {
        self.staged.push((r, obj));
    }

    /// The copy of `source_ref`, scheduling the object for copying.
    pub fn copy_ref(&mut self, source_ref: ObjectRef) -> ObjectRef {
        if let Some(&r) = self.map.get(&source_ref) {
            return r;
        }
        let r = self.allocate();
        self.map.insert(source_ref, r);
        self.pending.push_back((source_ref, r));
        r
    }

    /// Copy a direct value; references inside it are scheduled.
    pub fn copy_value(&mut self, obj: &Object) -> Object {
        match obj {
            Object::Reference(r) => Object::Reference(self.copy_ref(*r)),
            Object::Array(items) => Object::Array(items.iter().map(|o| self.copy_value(o)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict)),
            Object::Stream { dict, data } => Object::Stream {
                dict: self.copy_dict(dict),
                data: data.clone(),
            },
            other => other.clone(),
        }
    }

    fn copy_dict(&mut self, dict: &Dictionary) -> Dictionary {
        dict.iter()
            .filter(|(k, _)| !skip_key(dict, k))
            .map(|(k, v)| (k.clone(), self.copy_value(v)))
            .collect()
    }

    /// Copy every scheduled object. Missing source objects become null.
    pub fn drain(&mut self) {
        while let Some((src, dst)) = self.pending.pop_front() {
            let source = self.source;
            let obj = match source.get(src) {
                Some(obj) => self.copy_value(obj),
                None => {
                    log::debug!("copy of dangling reference {}", src);
                    Object::Null
                },
            };
            self.staged.push((dst, obj));
        }
    }

    /// Whether `source_ref` already has a copy.
    pub fn is_mapped(&self, source_ref: ObjectRef) -> bool {
        self.map.contains_key(&source_ref)
    }

    /// Copy everything scheduled and hand over the staged objects.
    pub fn finish(mut self) -> Vec<(ObjectRef, Object)> {
        self.drain();
        self.staged
    }

    /// Insert every staged object into `target`. Returns the next free
    /// object number.
    pub fn commit(mut self, target: &mut Document) -> u32 {
        self.drain();
        for (r, obj) in self.staged {
            target.set_object(r, obj);
        }
        self.next_id
    }
}
