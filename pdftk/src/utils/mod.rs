//! Object-graph helpers shared by the assembler and the report writers.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

use crate::io::ReaderId;

static NULL: Object = Object::Null;

/// Follow indirect references until a direct object is reached.
///
/// Broken or cyclic references resolve to `null`.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..32 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return &NULL,
            },
            _ => return current,
        }
    }
    &NULL
}

/// Look up `key` in `dict` and resolve it to a dictionary.
pub fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let obj = dict.get(key).ok()?;
    match resolve(doc, obj) {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Look up `key` in `dict` and resolve it to an array.
pub fn get_array<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Vec<Object>> {
    let obj = dict.get(key).ok()?;
    resolve(doc, obj).as_array().ok()
}

/// Resolve `key` in `dict` to a number, accepting integers and reals.
pub fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    let obj = dict.get(key).ok()?;
    as_number(resolve(doc, obj))
}

/// Numeric value of an integer or real object.
pub fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// The `/Type` name of a dictionary, if present.
pub fn type_name(dict: &Dictionary) -> Option<&[u8]> {
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Copies objects from reader instances into one output document.
///
/// Each source object is copied once per output; later references to it
/// reuse the copy. The map is keyed by reader instance as well as object
/// id, because two instances of the same input hold objects with equal ids
/// that must become distinct output objects.
///
/// Pages are special. The page tree of the source is not copied: `/Parent`
/// links and references to `/Pages` nodes point at the output's page root,
/// references to pages not (yet) imported become `null`, and the source
/// catalog is never copied.
#[derive(Debug)]
pub struct ObjectCopier {
    pages_root: ObjectId,
    copied: HashMap<(ReaderId, ObjectId), ObjectId>,
}

impl ObjectCopier {
    /// Create a copier that links pages under `pages_root`.
    pub fn new(pages_root: ObjectId) -> Self {
        Self {
            pages_root,
            copied: HashMap::new(),
        }
    }

    /// Output id of a source object copied earlier.
    pub fn copied_id(&self, reader: ReaderId, id: ObjectId) -> Option<ObjectId> {
        self.copied.get(&(reader, id)).copied()
    }

    /// Copy one page dictionary into `target` and return its new id.
    ///
    /// The caller is responsible for adding the id to the page tree.
    pub fn import_page(
        &mut self,
        target: &mut Document,
        source: &Document,
        reader: ReaderId,
        page_id: ObjectId,
        page: &Dictionary,
    ) -> ObjectId {
        let new_id = target.new_object_id();
        self.copied.insert((reader, page_id), new_id);

        let mut copy = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy(target, source, reader, value));
        }
        copy.set("Parent", Object::Reference(self.pages_root));
        target.objects.insert(new_id, Object::Dictionary(copy));
        new_id
    }

    /// Deep-copy `obj`, rewriting references into `target`'s id space.
    pub fn copy(
        &mut self,
        target: &mut Document,
        source: &Document,
        reader: ReaderId,
        obj: &Object,
    ) -> Object {
        match obj {
            Object::Reference(id) => self.copy_reference(target, source, reader, *id),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy(target, source, reader, item))
                    .collect(),
            ),
            Object::Dictionary(dict) => {
                Object::Dictionary(self.copy_dictionary(target, source, reader, dict))
            }
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.copy_dictionary(target, source, reader, &stream.dict);
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(
        &mut self,
        target: &mut Document,
        source: &Document,
        reader: ReaderId,
        dict: &Dictionary,
    ) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            copy.set(key.clone(), self.copy(target, source, reader, value));
        }
        copy
    }

    fn copy_reference(
        &mut self,
        target: &mut Document,
        source: &Document,
        reader: ReaderId,
        id: ObjectId,
    ) -> Object {
        if let Some(new_id) = self.copied_id(reader, id) {
            return Object::Reference(new_id);
        }

        let Ok(referenced) = source.get_object(id) else {
            return Object::Null;
        };

        if let Object::Dictionary(dict) = referenced {
            match type_name(dict) {
                Some(b"Page") => return Object::Null,
                Some(b"Pages") => return Object::Reference(self.pages_root),
                Some(b"Catalog") => return Object::Null,
                _ => {}
            }
        }

        // Register before recursing so cycles terminate.
        let new_id = target.new_object_id();
        self.copied.insert((reader, id), new_id);
        let copy = self.copy(target, source, reader, referenced);
        target.objects.insert(new_id, copy);
        Object::Reference(new_id)
    }
}
