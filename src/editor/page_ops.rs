//! Page tree mutation.
//!
//! Every operation validates its arguments and computes the new leaf order
//! before it changes anything, then commits by rebuilding the tree as a
//! single root `Pages` node. Attributes a leaf inherited from intermediate
//! nodes are copied onto the leaf first, so flattening never changes how a
//! page looks.

use super::deep_copy::Copier;
use super::{PageEditor, PageMove};
use crate::audit;
use crate::document::{normalize_rotation, Document, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{dict, Dictionary, Object, ObjectRef};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Page attributes that may be inherited from ancestors.
pub const INHERITABLE: [&str; 4] = ["MediaBox", "CropBox", "Resources", "Rotate"];

/// Clamp an insertion point to `1..=page_count + 1`.
pub fn clamp_insert_position(position: usize, page_count: usize) -> usize {
    position.clamp(1, page_count + 1)
}

fn leaf_refs(doc: &Document) -> Vec<ObjectRef> {
    doc.pages().iter().map(|p| p.object_ref).collect()
}

/// Raw value of `key` on the nearest ancestor of `leaf` that sets it.
fn inherited_raw(doc: &Document, leaf: ObjectRef, key: &str) -> Option<Object> {
    let mut visited = HashSet::from([leaf]);
    let mut current = doc.get(leaf)?.as_dict()?.get("Parent")?.as_reference()?;
    while visited.insert(current) {
        let d = doc.get(current)?.as_dict()?;
        if let Some(value) = d.get(key) {
            return Some(value.clone());
        }
        current = d.get("Parent")?.as_reference()?;
    }
    None
}

/// A leaf's dictionary with inherited attributes filled in and no
/// `/Parent`.
pub(crate) fn materialized_page(doc: &Document, leaf: ObjectRef) -> Dictionary {
    let mut page = doc
        .get(leaf)
        .and_then(Object::as_dict)
        .cloned()
        .unwrap_or_default();
    for key in INHERITABLE {
        if !page.contains_key(key) {
            if let Some(value) = inherited_raw(doc, leaf, key) {
                page.insert(key.to_string(), value);
            }
        }
    }
    if !page.contains_key("MediaBox") {
        let (w, h) = DEFAULT_PAGE_SIZE;
        page.insert("MediaBox".to_string(), Rect::new(0.0, 0.0, w, h).to_object());
    }
    page.remove("Parent");
    page
}

/// Refs of every intermediate node below `root`.
fn intermediate_nodes(doc: &Document, root: ObjectRef) -> Vec<ObjectRef> {
    let mut out = Vec::new();
    let mut visited = HashSet::from([root]);
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let kids = doc
            .get(node)
            .and_then(Object::as_dict)
            .and_then(|d| d.get("Kids"))
            .map(|k| doc.resolve(k))
            .and_then(Object::as_array);
        for kid in kids.into_iter().flatten().filter_map(Object::as_reference) {
            let is_node = doc.get(kid).and_then(Object::dict_type) == Some("Pages");
            if is_node && visited.insert(kid) {
                out.push(kid);
                stack.push(kid);
            }
        }
    }
    out
}

/// Replace the page tree with a single root whose kids are `leaves`.
fn commit(doc: &mut Document, root: ObjectRef, leaves: &[ObjectRef]) {
    let pages: Vec<Dictionary> = leaves.iter().map(|&l| materialized_page(doc, l)).collect();
    let stale = intermediate_nodes(doc, root);

    let mut root_dict = doc
        .get(root)
        .and_then(Object::as_dict)
        .cloned()
        .unwrap_or_default();
    for key in INHERITABLE.iter().chain(&["Parent"]) {
        root_dict.remove(*key);
    }
    root_dict.insert("Type".into(), Object::name("Pages"));
    root_dict.insert(
        "Kids".into(),
        Object::Array(leaves.iter().map(|&r| Object::Reference(r)).collect()),
    );
    root_dict.insert("Count".into(), Object::Integer(leaves.len() as i64));
    doc.set_object(root, Object::Dictionary(root_dict));

    for (&leaf, mut page) in leaves.iter().zip(pages) {
        page.insert("Parent".into(), Object::Reference(root));
        doc.set_object(leaf, Object::Dictionary(page));
    }
    for node in stale {
        doc.remove_object(node);
    }
}

/// Add a blank page object (not yet in the tree).
fn blank_page(doc: &mut Document, root: ObjectRef, media_box: Rect) -> ObjectRef {
    let contents = doc.add_object(Object::stream(Dictionary::new(), bytes::Bytes::new()));
    doc.add_object(Object::Dictionary(dict([
        ("Type", Object::name("Page")),
        ("Parent", Object::Reference(root)),
        ("MediaBox", media_box.to_object()),
        ("Resources", Object::Dictionary(Dictionary::new())),
        ("Contents", Object::Reference(contents)),
    ])))
}

/// MediaBox for a page inserted before `position`: the previous page's,
/// else the next page's, else A4.
fn neighbour_media_box(doc: &Document, leaves: &[ObjectRef], position: usize) -> Rect {
    let neighbour = if position >= 2 {
        leaves.get(position - 2)
    } else {
        leaves.first()
    };
    match neighbour {
        Some(&r) => doc.media_box(r),
        None => Rect::new(0.0, 0.0, DEFAULT_PAGE_SIZE.0, DEFAULT_PAGE_SIZE.1),
    }
}

fn check_rotation(operation: &'static str, delta: i64) -> Result<()> {
    if delta % 90 != 0 {
        return Err(Error::invalid_argument(
            operation,
            format!("rotation {} is not a multiple of 90", delta),
        ));
    }
    Ok(())
}

fn set_page_key(doc: &mut Document, page: ObjectRef, key: &str, value: Object) {
    if let Some(d) = doc.get_mut(page).and_then(Object::as_dict_mut) {
        d.insert(key.to_string(), value);
    }
}

/// `order[i]` is the 1-based original index of the page placed at `i + 1`.
fn permutation_for(mv: &PageMove, page_count: usize) -> Result<Vec<usize>> {
    let check = |p: usize| -> Result<usize> {
        if p == 0 || p > page_count {
            return Err(Error::PageNotFound {
                operation: "move_pages",
                page: p,
                page_count,
            });
        }
        Ok(p)
    };
    let selection = |pages: &[usize]| -> Result<Vec<usize>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &p in pages {
            if seen.insert(check(p)?) {
                out.push(p);
            }
        }
        if out.is_empty() {
            return Err(Error::invalid_argument("move_pages", "no pages selected"));
        }
        Ok(out)
    };

    let mut order: Vec<usize> = (1..=page_count).collect();
    match mv {
        PageMove::Up(pages) | PageMove::Down(pages) => {
            let chosen: HashSet<usize> = selection(pages)?.into_iter().collect();
            let up = matches!(mv, PageMove::Up(_));
            let mut items: Vec<(usize, bool)> = order.iter().map(|&p| (p, chosen.contains(&p))).collect();
            if up {
                for i in 1..items.len() {
                    if items[i].1 && !items[i - 1].1 {
                        items.swap(i - 1, i);
                    }
                }
            } else {
                for i in (0..items.len().saturating_sub(1)).rev() {
                    if items[i].1 && !items[i + 1].1 {
                        items.swap(i, i + 1);
                    }
                }
            }
            order = items.into_iter().map(|(p, _)| p).collect();
        },
        PageMove::First(pages) | PageMove::Last(pages) => {
            let chosen = selection(pages)?;
            let rest: Vec<usize> = order.into_iter().filter(|p| !chosen.contains(p)).collect();
            order = if matches!(mv, PageMove::First(_)) {
                chosen.into_iter().chain(rest).collect()
            } else {
                rest.into_iter().chain(chosen).collect()
            };
        },
        PageMove::Swap(a, b) => {
            let (a, b) = (check(*a)?, check(*b)?);
            order.swap(a - 1, b - 1);
        },
        PageMove::MoveTo { from, to } => {
            let from = check(*from)?;
            let to = (*to).clamp(1, page_count);
            let page = order.remove(from - 1);
            order.insert(to - 1, page);
        },
    }
    Ok(order)
}

impl PageEditor for Document {
    fn insert_blank(&mut self, position: usize) -> Result<usize> {
        self.ensure_unlocked("insert_blank")?;
        let root = self.pages_root_ref()?;
        let mut leaves = leaf_refs(self);
        let position = clamp_insert_position(position, leaves.len());
        let media_box = neighbour_media_box(self, &leaves, position);
        let page = blank_page(self, root, media_box);
        leaves.insert(position - 1, page);
        commit(self, root, &leaves);
        log::debug!("inserted blank page at {}", position);
        Ok(position)
    }

    fn insert_blank_pages(&mut self, positions: &[usize]) -> Result<()> {
        if positions.is_empty() {
            return Err(Error::invalid_argument("insert_blank_pages", "no positions given"));
        }
        self.ensure_unlocked("insert_blank_pages")?;
        let root = self.pages_root_ref()?;
        let original = leaf_refs(self);
        let mut targets: Vec<usize> = positions
            .iter()
            .map(|&p| clamp_insert_position(p, original.len()))
            .collect();
        targets.sort_unstable_by(|a, b| b.cmp(a));

        let mut leaves = original.clone();
        for position in targets {
            let media_box = neighbour_media_box(self, &original, position);
            let page = blank_page(self, root, media_box);
            leaves.insert(position - 1, page);
        }
        commit(self, root, &leaves);
        Ok(())
    }

    fn remove(&mut self, positions: &[usize]) -> Result<usize> {
        self.ensure_unlocked("remove")?;
        let root = self.pages_root_ref()?;
        let leaves = leaf_refs(self);
        let valid: BTreeSet<usize> = positions
            .iter()
            .copied()
            .filter(|p| (1..=leaves.len()).contains(p))
            .collect();
        if valid.is_empty() {
            return Err(Error::invalid_argument(
                "remove",
                format!("no position in {:?} is within 1..={}", positions, leaves.len()),
            ));
        }
        let kept: Vec<ObjectRef> = leaves
            .iter()
            .enumerate()
            .filter(|(i, _)| !valid.contains(&(i + 1)))
            .map(|(_, &r)| r)
            .collect();
        commit(self, root, &kept);
        Ok(valid.len())
    }

    fn rotate(&mut self, position: usize, delta_degrees: i64) -> Result<i64> {
        check_rotation("rotate", delta_degrees)?;
        self.ensure_unlocked("rotate")?;
        let page = self.page_for("rotate", position)?;
        let rotation = normalize_rotation(self.rotation(page.object_ref) + delta_degrees);
        set_page_key(self, page.object_ref, "Rotate", Object::Integer(rotation));
        Ok(rotation)
    }

    fn rotate_pages(&mut self, positions: &[usize], delta_degrees: i64) -> Result<()> {
        check_rotation("rotate_pages", delta_degrees)?;
        if positions.is_empty() {
            return Err(Error::invalid_argument("rotate_pages", "no positions given"));
        }
        self.ensure_unlocked("rotate_pages")?;
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        for &p in positions {
            let page = self.page_for("rotate_pages", p)?;
            if seen.insert(p) {
                pages.push(page.object_ref);
            }
        }
        for page in pages {
            let rotation = normalize_rotation(self.rotation(page) + delta_degrees);
            set_page_key(self, page, "Rotate", Object::Integer(rotation));
        }
        Ok(())
    }

    fn duplicate(&mut self, position: usize, count: usize, target_position: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::invalid_argument("duplicate", "count must be at least 1"));
        }
        self.ensure_unlocked("duplicate")?;
        let source = self.page_for("duplicate", position)?;
        let root = self.pages_root_ref()?;
        let mut leaves = leaf_refs(self);
        let target = clamp_insert_position(target_position, leaves.len());
        let page = Object::Dictionary(materialized_page(self, source.object_ref));

        // One copier per copy: copies share nothing with each other.
        let mut next_id = self.next_object_id();
        let mut copies = Vec::with_capacity(count);
        let mut staged = Vec::new();
        for _ in 0..count {
            let mut copier = Copier::new(self, next_id);
            // Links to other pages keep pointing into the tree.
            for &leaf in leaves.iter().filter(|&&l| l != source.object_ref) {
                copier.share(leaf);
            }
            let copy = copier.reserve(source.object_ref);
            let value = copier.copy_value(&page);
            copier.define(copy, value);
            copier.drain();
            next_id = copier.next_id();
            staged.extend(copier.finish());
            copies.push(copy);
        }

        for (r, obj) in staged {
            self.set_object(r, obj);
        }
        leaves.splice(target - 1..target - 1, copies);
        commit(self, root, &leaves);
        Ok(())
    }

    fn reorder(&mut self, permutation: &[usize]) -> Result<()> {
        self.ensure_unlocked("reorder")?;
        let root = self.pages_root_ref()?;
        let leaves = leaf_refs(self);
        let n = leaves.len();
        if permutation.len() != n {
            return Err(Error::invalid_argument(
                "reorder",
                format!("expected {} entries, got {}", n, permutation.len()),
            ));
        }
        let mut seen = vec![false; n];
        for &p in permutation {
            if p == 0 || p > n {
                return Err(Error::invalid_argument(
                    "reorder",
                    format!("{} is outside 1..={}", p, n),
                ));
            }
            if std::mem::replace(&mut seen[p - 1], true) {
                return Err(Error::invalid_argument("reorder", format!("{} appears twice", p)));
            }
        }
        let ordered: Vec<ObjectRef> = permutation.iter().map(|&p| leaves[p - 1]).collect();
        commit(self, root, &ordered);
        Ok(())
    }

    fn move_pages(&mut self, mv: &PageMove) -> Result<()> {
        let order = permutation_for(mv, self.page_count())?;
        self.reorder(&order)
    }

    fn crop(&mut self, position: usize, rect: Rect) -> Result<()> {
        if !rect.is_positive() {
            return Err(Error::invalid_argument(
                "crop",
                format!("crop box {}x{} has no area", rect.width, rect.height),
            ));
        }
        self.ensure_unlocked("crop")?;
        let page = self.page_for("crop", position)?;
        set_page_key(self, page.object_ref, "CropBox", rect.to_object());
        Ok(())
    }
}

/// Build a document from pages of other documents.
///
/// Object numbers start at `first_id`. Pages of one source share copies
/// of common resources; a page selected twice gets two independent copies.
fn assemble(sources: &[(&Document, Vec<ObjectRef>)], first_id: u32) -> Result<Document> {
    let first_id = first_id.max(1);
    let mut out = Document::with_root_ids(first_id, first_id + 1);
    if let Some((first, _)) = sources.first() {
        out.set_version(first.version());
    }
    let root = out.pages_root_ref()?;
    let mut next_id = first_id + 2;
    let mut leaves = Vec::new();

    for (index, (doc, pages)) in sources.iter().enumerate() {
        let mut copier = Copier::new(doc, next_id);
        if index == 0 {
            if let Some(info) = doc.trailer().get("Info") {
                let info = copier.copy_value(info);
                out.trailer_mut().insert("Info".into(), info);
            }
        }
        for &page in pages {
            if copier.is_mapped(page) {
                next_id = copier.commit(&mut out);
                copier = Copier::new(doc, next_id);
            }
            let copy = copier.reserve(page);
            let value = copier.copy_value(&Object::Dictionary(materialized_page(doc, page)));
            copier.define(copy, value);
            leaves.push(copy);
        }
        next_id = copier.commit(&mut out);
    }

    commit(&mut out, root, &leaves);
    Ok(out)
}

/// Split into pages `1..=boundary` and `boundary+1..`.
///
/// Both outputs number their objects above the source's highest object
/// number and never share a number with each other.
pub fn split(doc: &Document, boundary: usize) -> Result<(Document, Document)> {
    let result = (|| -> Result<(Document, Document)> {
        doc.ensure_unlocked("split")?;
        let leaves = leaf_refs(doc);
        if boundary == 0 || boundary >= leaves.len() {
            return Err(Error::invalid_argument(
                "split",
                format!("boundary {} is outside 1..={}", boundary, leaves.len().saturating_sub(1)),
            ));
        }
        let (head, tail) = leaves.split_at(boundary);
        let first = assemble(&[(doc, head.to_vec())], doc.next_object_id())?;
        let second = assemble(&[(doc, tail.to_vec())], first.next_object_id())?;
        Ok((first, second))
    })();
    audit::record("split", result, Some(doc.page_count()))
}

/// Concatenate the pages of `docs`, in order.
pub fn merge(docs: &[&Document]) -> Result<Document> {
    let result = (|| -> Result<Document> {
        if docs.is_empty() {
            return Err(Error::invalid_argument("merge", "no documents given"));
        }
        for doc in docs {
            doc.ensure_unlocked("merge")?;
        }
        let sources: Vec<(&Document, Vec<ObjectRef>)> =
            docs.iter().map(|&d| (d, leaf_refs(d))).collect();
        assemble(&sources, 1)
    })();
    let pages = result.as_ref().ok().map(Document::page_count);
    audit::record("merge", result, pages)
}

/// A new document holding the selected pages in the given order.
///
/// Positions outside the document are ignored; a page listed twice is
/// copied twice.
pub fn extract_pages(doc: &Document, positions: &[usize]) -> Result<Document> {
    let result = (|| -> Result<Document> {
        doc.ensure_unlocked("extract_pages")?;
        let leaves = leaf_refs(doc);
        let selected: Vec<ObjectRef> = positions
            .iter()
            .filter(|&&p| (1..=leaves.len()).contains(&p))
            .map(|&p| leaves[p - 1])
            .collect();
        if selected.is_empty() {
            return Err(Error::invalid_argument(
                "extract_pages",
                format!("no position in {:?} is within 1..={}", positions, leaves.len()),
            ));
        }
        assemble(&[(doc, selected)], 1)
    })();
    let pages = result.as_ref().ok().map(Document::page_count);
    audit::record("extract_pages", result, pages)
}

/// Load several files in parallel and merge them in order.
///
/// A file that fails to load is reported as [`Error::Input`].
pub fn merge_files<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Document> {
    let docs: Result<Vec<Document>> = paths
        .par_iter()
        .map(|p| Document::load(p))
        .collect();
    let docs = match docs {
        Ok(docs) => docs,
        Err(e) => return audit::record("merge_files", Err(e), None),
    };
    let refs: Vec<&Document> = docs.iter().collect();
    merge(&refs)
}
