//! The ROM list of one page.
//!
//! ROMs live in a slot arena and are chained in offset order through `prev` and
//! `next` handles, so neighbors, insertion at a known position and removal are
//! all O(1). A [`RomId`] carries the generation of its slot: once a ROM is
//! removed its id stops resolving, even after the slot is reused.
//!
//! The layout of a valid image satisfies:
//! - no two ROMs overlap,
//! - every ROM starts on a multiple of its own size,
//! - every size passes [`check_size`],
//! - offsets strictly increase from head to tail.
//!
//! The unchecked primitives (`insert_head`, `insert_tail`, `insert_after`) trust
//! the caller with all of the above.

use std::{fmt, iter::Rev};

use log::{debug, trace};

use crate::{
    cartridge::Limits,
    policy::check_size,
    rom::{Rom, RomSource},
    InsertError, LayoutError,
};

/// Stable handle to a ROM in an [`Image`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RomId {
    index: u32,
    generation: u32,
}

impl fmt::Display for RomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

struct Node<H, F> {
    rom: Rom<H, F>,
    prev: Option<RomId>,
    next: Option<RomId>,
}

struct Slot<H, F> {
    generation: u32,
    node: Option<Node<H, F>>,
}

pub struct Image<H, F> {
    slots: Vec<Slot<H, F>>,
    free: Vec<u32>,
    head: Option<RomId>,
    tail: Option<RomId>,
    len: usize,
    limits: Limits,
}

impl<H, F> Default for Image<H, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: fmt::Debug, F: fmt::Debug> fmt::Debug for Image<H, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("limits", &self.limits)
            .field("roms", &self.iter().map(|(_, rom)| rom).collect::<Vec<_>>())
            .finish()
    }
}

impl<H, F> Image<H, F> {
    /// An empty image checked against [`Limits::default`].
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            limits,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The ROM with the lowest offset
    pub fn first(&self) -> Option<RomId> {
        self.head
    }

    /// The ROM with the highest offset
    pub fn last(&self) -> Option<RomId> {
        self.tail
    }

    pub fn contains(&self, id: RomId) -> bool {
        self.node(id).is_some()
    }

    pub fn get(&self, id: RomId) -> Option<&Rom<H, F>> {
        self.node(id).map(|node| &node.rom)
    }

    /// Offset and size are not reachable mutably; moving a ROM is a remove and an insert.
    pub fn header_mut(&mut self, id: RomId) -> Option<&mut H> {
        self.node_mut(id).map(|node| &mut node.rom.header)
    }

    pub fn source_mut(&mut self, id: RomId) -> Option<&mut RomSource<F>> {
        self.node_mut(id).map(|node| &mut node.rom.source)
    }

    /// The ROM before `id`, or `None` if `id` is the first one or not in the image.
    pub fn prev(&self, id: RomId) -> Option<RomId> {
        self.node(id).and_then(|node| node.prev)
    }

    /// The ROM after `id`, or `None` if `id` is the last one or not in the image.
    pub fn next(&self, id: RomId) -> Option<RomId> {
        self.node(id).and_then(|node| node.next)
    }

    /// Iterates in ascending offset order. Use `.rev()` or [`Image::iter_rev`] for descending.
    pub fn iter(&self) -> Iter<'_, H, F> {
        Iter {
            image: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    pub fn iter_rev(&self) -> Rev<Iter<'_, H, F>> {
        self.iter().rev()
    }

    /// A traversal that allows removing the ROM it just yielded. See [`Walker`].
    pub fn walk(&self) -> Walker {
        Walker {
            next: self.head,
            reverse: false,
        }
    }

    pub fn walk_rev(&self) -> Walker {
        Walker {
            next: self.tail,
            reverse: true,
        }
    }

    pub fn find_by_offset(&self, offset: u32) -> Option<RomId> {
        self.iter()
            .take_while(|(_, rom)| rom.offset <= offset)
            .find(|(_, rom)| rom.offset == offset)
            .map(|(id, _)| id)
    }

    /// The ROM covering byte `addr` of the page
    pub fn find_containing(&self, addr: u32) -> Option<RomId> {
        self.iter()
            .take_while(|(_, rom)| rom.offset <= addr)
            .find(|(_, rom)| rom.contains(addr))
            .map(|(id, _)| id)
    }

    /// Sum of the sizes of all ROMs
    pub fn used_bytes(&self) -> u64 {
        self.iter().map(|(_, rom)| rom.size as u64).sum()
    }

    /// Places `rom` first. The caller guarantees it ends before the current first ROM.
    pub fn insert_head(&mut self, rom: Rom<H, F>) -> RomId {
        let old_head = self.head;
        let id = self.alloc(rom, None, old_head);

        match old_head {
            Some(head) => self.set_prev(head, Some(id)),
            None => self.tail = Some(id),
        }
        self.head = Some(id);

        trace!("Inserted ROM {} at head", id);
        id
    }

    /// Places `rom` last. The caller guarantees it starts after the current last ROM.
    pub fn insert_tail(&mut self, rom: Rom<H, F>) -> RomId {
        let old_tail = self.tail;
        let id = self.alloc(rom, old_tail, None);

        match old_tail {
            Some(tail) => self.set_next(tail, Some(id)),
            None => self.head = Some(id),
        }
        self.tail = Some(id);

        trace!("Inserted ROM {} at tail", id);
        id
    }

    /// Places `rom` right after `anchor`. The caller guarantees it fits between
    /// `anchor` and its successor.
    ///
    /// Fails only when `anchor` is not in the image.
    pub fn insert_after(
        &mut self,
        anchor: RomId,
        rom: Rom<H, F>,
    ) -> Result<RomId, InsertError<H, F>> {
        let next = match self.node(anchor) {
            Some(node) => node.next,
            None => return Err(InsertError::new(rom, LayoutError::DanglingRom(anchor))),
        };

        let id = self.alloc(rom, Some(anchor), next);
        self.set_next(anchor, Some(id));
        match next {
            Some(next) => self.set_prev(next, Some(id)),
            None => self.tail = Some(id),
        }

        trace!("Inserted ROM {} after {}", id, anchor);
        Ok(id)
    }

    /// Detaches `id` and gives the ROM back. Returns `None` if it is not in the image.
    pub fn remove(&mut self, id: RomId) -> Option<Rom<H, F>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        // A slot out of generations is retired so old ids never resolve again
        if slot.generation < u32::MAX {
            slot.generation += 1;
            self.free.push(id.index);
        }
        self.len -= 1;

        match node.prev {
            Some(prev) => self.set_next(prev, node.next),
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.set_prev(next, node.prev),
            None => self.tail = node.prev,
        }

        trace!("Removed ROM {} at {:#08x}", id, node.rom.offset);
        Some(node.rom)
    }

    /// Removes every ROM. Ids handed out before stay invalid.
    pub fn clear(&mut self) {
        let mut walker = self.walk();
        while let Some(id) = walker.next(self) {
            self.remove(id);
        }
    }

    /// Checked [`Image::insert_head`].
    pub fn try_insert_head(&mut self, rom: Rom<H, F>) -> Result<RomId, InsertError<H, F>> {
        if let Err(error) = self.check_placement(&rom, None, self.head) {
            return Err(self.reject(rom, error));
        }
        Ok(self.insert_head(rom))
    }

    /// Checked [`Image::insert_tail`].
    pub fn try_insert_tail(&mut self, rom: Rom<H, F>) -> Result<RomId, InsertError<H, F>> {
        if let Err(error) = self.check_placement(&rom, self.tail, None) {
            return Err(self.reject(rom, error));
        }
        Ok(self.insert_tail(rom))
    }

    /// Checked [`Image::insert_after`].
    pub fn try_insert_after(
        &mut self,
        anchor: RomId,
        rom: Rom<H, F>,
    ) -> Result<RomId, InsertError<H, F>> {
        let next = match self.node(anchor) {
            Some(node) => node.next,
            None => return Err(self.reject(rom, LayoutError::DanglingRom(anchor))),
        };
        if let Err(error) = self.check_placement(&rom, Some(anchor), next) {
            return Err(self.reject(rom, error));
        }
        self.insert_after(anchor, rom)
    }

    /// Inserts `rom` at the position its offset calls for, refusing it if that
    /// would break the layout.
    ///
    /// Only the would-be neighbors are compared against, so the rest of the image
    /// is assumed valid. Run [`Image::validate`] first on an image assembled with
    /// the unchecked primitives.
    pub fn insert(&mut self, rom: Rom<H, F>) -> Result<RomId, InsertError<H, F>> {
        // Scan from the tail, ROMs tend to be added in ascending order
        let prev = self
            .iter_rev()
            .find(|(_, other)| other.offset < rom.offset)
            .map(|(id, _)| id);
        let next = match prev {
            Some(prev) => self.next(prev),
            None => self.head,
        };

        if let Err(error) = self.check_placement(&rom, prev, next) {
            return Err(self.reject(rom, error));
        }

        match prev {
            Some(prev) => self.insert_after(prev, rom),
            None => Ok(self.insert_head(rom)),
        }
    }

    /// Checks the whole image, reporting the first broken rule in offset order.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut prev: Option<(RomId, &Rom<H, F>)> = None;
        for (id, rom) in self.iter() {
            self.check_rom(rom)?;
            if let Some((prev_id, prev_rom)) = prev {
                check_order(prev_id, prev_rom, rom)?;
            }
            prev = Some((id, rom));
        }
        Ok(())
    }

    /// Size, alignment and page bound of a single ROM
    pub fn check_rom(&self, rom: &Rom<H, F>) -> Result<(), LayoutError> {
        check_size(rom.size, self.limits.min_rom_size)?;
        self.check_bounds(rom)
    }

    fn check_bounds(&self, rom: &Rom<H, F>) -> Result<(), LayoutError> {
        if !rom.is_aligned() {
            return Err(LayoutError::Misaligned {
                offset: rom.offset,
                size: rom.size,
            });
        }
        if let Some(page_size) = self.limits.page_size {
            if rom.end() > page_size as u64 {
                return Err(LayoutError::OutOfPage {
                    offset: rom.offset,
                    size: rom.size,
                    page_size,
                });
            }
        }
        Ok(())
    }

    fn check_placement(
        &self,
        rom: &Rom<H, F>,
        prev: Option<RomId>,
        next: Option<RomId>,
    ) -> Result<(), LayoutError> {
        check_size(rom.size, self.limits.min_rom_size)?;
        if let Some((prev, prev_rom)) = prev.and_then(|id| self.get(id).map(|r| (id, r))) {
            check_order(prev, prev_rom, rom)?;
        }
        if let Some((next, next_rom)) = next.and_then(|id| self.get(id).map(|r| (id, r))) {
            if rom.overlaps(next_rom) {
                return Err(overlap(rom, next, next_rom));
            }
            if rom.offset > next_rom.offset {
                return Err(LayoutError::OutOfOrder {
                    offset: rom.offset,
                    neighbor: next,
                    neighbor_offset: next_rom.offset,
                });
            }
        }
        // Conflicts with neighbors are reported ahead of alignment
        self.check_bounds(rom)
    }

    fn reject(&self, rom: Rom<H, F>, error: LayoutError) -> InsertError<H, F> {
        debug!("Rejected ROM at {:#08x}: {}", rom.offset, error);
        InsertError::new(rom, error)
    }

    fn alloc(&mut self, rom: Rom<H, F>, prev: Option<RomId>, next: Option<RomId>) -> RomId {
        let node = Some(Node { rom, prev, next });
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = node;
            RomId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node,
            });
            RomId {
                index,
                generation: 0,
            }
        }
    }

    fn node(&self, id: RomId) -> Option<&Node<H, F>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: RomId) -> Option<&mut Node<H, F>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn set_prev(&mut self, id: RomId, prev: Option<RomId>) {
        if let Some(node) = self.node_mut(id) {
            node.prev = prev;
        }
    }

    fn set_next(&mut self, id: RomId, next: Option<RomId>) {
        if let Some(node) = self.node_mut(id) {
            node.next = next;
        }
    }
}

/// `rom` must come after `prev_rom` without touching it.
fn check_order<H, F>(
    prev: RomId,
    prev_rom: &Rom<H, F>,
    rom: &Rom<H, F>,
) -> Result<(), LayoutError> {
    if rom.overlaps(prev_rom) {
        return Err(overlap(rom, prev, prev_rom));
    }
    if rom.offset < prev_rom.offset {
        return Err(LayoutError::OutOfOrder {
            offset: rom.offset,
            neighbor: prev,
            neighbor_offset: prev_rom.offset,
        });
    }
    Ok(())
}

fn overlap<H, F>(rom: &Rom<H, F>, conflict: RomId, conflict_rom: &Rom<H, F>) -> LayoutError {
    LayoutError::Overlap {
        offset: rom.offset,
        size: rom.size,
        conflict,
        conflict_offset: conflict_rom.offset,
        conflict_size: conflict_rom.size,
    }
}

/// Ascending (or, reversed, descending) walk over the ROMs of an [`Image`].
pub struct Iter<'a, H, F> {
    image: &'a Image<H, F>,
    front: Option<RomId>,
    back: Option<RomId>,
    remaining: usize,
}

impl<'a, H, F> Iterator for Iter<'a, H, F> {
    type Item = (RomId, &'a Rom<H, F>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front?;
        let node = self.image.node(id)?;
        self.front = node.next;
        self.remaining -= 1;
        Some((id, &node.rom))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, H, F> DoubleEndedIterator for Iter<'a, H, F> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back?;
        let node = self.image.node(id)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some((id, &node.rom))
    }
}

impl<H, F> ExactSizeIterator for Iter<'_, H, F> {}

impl<'a, H, F> IntoIterator for &'a Image<H, F> {
    type Item = (RomId, &'a Rom<H, F>);
    type IntoIter = Iter<'a, H, F>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A traversal that does not borrow the image between steps.
///
/// The handle of the following ROM is read before the current one is yielded,
/// so the caller may remove the yielded ROM and keep walking:
///
/// ```
/// # use ems_image::{Image, Rom};
/// let mut image: Image<(), ()> = Image::new();
/// image.insert_tail(Rom::from_flash(0, 0x8000, 0, ()));
/// image.insert_tail(Rom::from_flash(0x8000, 0x8000, 0x8000, ()));
///
/// let mut walker = image.walk();
/// while let Some(id) = walker.next(&image) {
///     image.remove(id);
/// }
/// assert!(image.is_empty());
/// ```
///
/// Removing any other ROM mid-walk is not supported.
#[derive(Copy, Clone, Debug)]
pub struct Walker {
    next: Option<RomId>,
    reverse: bool,
}

impl Walker {
    pub fn next<H, F>(&mut self, image: &Image<H, F>) -> Option<RomId> {
        let current = self.next?;
        let node = image.node(current)?;
        self.next = if self.reverse { node.prev } else { node.next };
        Some(current)
    }
}
