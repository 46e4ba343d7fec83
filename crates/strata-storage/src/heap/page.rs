//! Heap page implementation using a fixed-slot bitmap format.
//!
//! Every slot holds exactly one tuple of the table's fixed tuple size. A
//! header bitmap records which slots are occupied: bit `i` of the header
//! (least significant bit first within each byte) is set iff slot `i`
//! holds a tuple. See [`PageLayout`] for the byte layout.

use super::layout::PageLayout;
use crate::tuple::{RecordId, Tuple};
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;
use strata_common::page::PageId;
use strata_common::{Result, Schema, StrataError, TransactionId};

/// A decoded heap page.
///
/// The header bitmap and the slot contents change together: a slot holds a
/// tuple iff its header bit is set.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    layout: PageLayout,
    /// Occupancy bitmap, exactly `layout.header_size()` bytes.
    header: Vec<u8>,
    /// Slot contents, `layout.num_slots()` entries.
    tuples: Vec<Option<Tuple>>,
    /// Transaction that last dirtied this page.
    dirtied_by: Option<TransactionId>,
    /// Bytes as of the last load or write-back.
    before_image: Bytes,
}

impl HeapPage {
    /// Decodes a page from exactly `page_size` bytes.
    ///
    /// Fails with `PageCorrupted` if the buffer has the wrong length or an
    /// occupied slot does not decode under `schema`.
    pub fn from_bytes(
        page_id: PageId,
        schema: Arc<Schema>,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self> {
        let layout = PageLayout::new(page_size, schema.tuple_size())?;
        if data.len() != page_size {
            return Err(StrataError::PageCorrupted {
                page_id,
                reason: format!("expected {} bytes, got {}", page_size, data.len()),
            });
        }

        let header = data[..layout.header_size()].to_vec();
        let mut tuples = Vec::with_capacity(layout.num_slots());
        for slot in 0..layout.num_slots() {
            if !bit_is_set(&header, slot) {
                tuples.push(None);
                continue;
            }

            let start = layout.slot_offset(slot);
            let mut window = &data[start..start + layout.tuple_size()];
            let mut tuple = Tuple::deserialize(Arc::clone(&schema), &mut window).map_err(|e| {
                StrataError::PageCorrupted {
                    page_id,
                    reason: format!("slot {}: {}", slot, e),
                }
            })?;
            tuple.set_record_id(Some(RecordId::new(page_id, slot as u16)));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            schema,
            layout,
            header,
            tuples,
            dirtied_by: None,
            before_image: Bytes::copy_from_slice(data),
        })
    }

    /// Creates an empty page, as decoded from an all-zero buffer.
    pub fn new_empty(page_id: PageId, schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        Self::from_bytes(
            page_id,
            schema,
            page_size,
            &Self::create_empty_page_data(page_size),
        )
    }

    /// Returns the bytes of an empty page: all zeros.
    pub fn create_empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Serializes the page to exactly `page_size` bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.layout.page_size());
        buf.put_slice(&self.header);
        for slot in &self.tuples {
            match slot {
                Some(tuple) => tuple.serialize_into(&mut buf),
                None => buf.put_bytes(0, self.layout.tuple_size()),
            }
        }
        buf.put_bytes(0, self.layout.padding());
        buf.freeze()
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the schema of tuples on this page.
    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the page's geometry.
    #[inline]
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.layout.page_size()
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.layout.num_slots()
    }

    #[inline]
    pub fn header_size(&self) -> usize {
        self.layout.header_size()
    }

    /// Returns true if slot `slot` holds a tuple. Out of range slots are
    /// never used.
    #[inline]
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.layout.num_slots() && bit_is_set(&self.header, slot)
    }

    /// Returns the number of free slots.
    pub fn num_empty_slots(&self) -> usize {
        self.tuples.iter().filter(|t| t.is_none()).count()
    }

    /// Returns the number of occupied slots.
    pub fn tuple_count(&self) -> usize {
        self.layout.num_slots() - self.num_empty_slots()
    }

    /// Returns the tuple in `slot`, if occupied.
    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(Option::as_ref)
    }

    /// Returns the first occupied slot at or after `from`.
    pub fn next_used_slot(&self, from: usize) -> Option<usize> {
        (from..self.layout.num_slots()).find(|&slot| self.tuples[slot].is_some())
    }

    /// Stores `tuple` in the lowest free slot and sets its record ID.
    ///
    /// Fails with `SchemaMismatch` if the tuple's shape does not match the
    /// page's schema and with `PageFull` if no slot is free. The page is
    /// unchanged on failure.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        tuple.check_schema(&self.schema)?;

        let slot = self
            .tuples
            .iter()
            .position(Option::is_none)
            .ok_or(StrataError::PageFull)?;

        let record_id = RecordId::new(self.page_id, slot as u16);
        tuple.set_record_id(Some(record_id));
        set_bit(&mut self.header, slot, true);
        self.tuples[slot] = Some(tuple.clone());

        Ok(record_id)
    }

    /// Frees the slot named by `tuple`'s record ID.
    ///
    /// Fails with `TupleNotOnPage` if the tuple has no record ID or it names
    /// another page, and with `SlotEmpty` if the slot is already free.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| StrataError::TupleNotOnPage {
                page_id: self.page_id,
                reason: "tuple has no record id".to_string(),
            })?;

        if record_id.page_id != self.page_id {
            return Err(StrataError::TupleNotOnPage {
                page_id: self.page_id,
                reason: format!("record id names page {}", record_id.page_id),
            });
        }

        let slot = record_id.slot as usize;
        if !self.is_slot_used(slot) {
            return Err(StrataError::SlotEmpty {
                page_id: self.page_id,
                slot: record_id.slot,
            });
        }

        set_bit(&mut self.header, slot, false);
        self.tuples[slot] = None;
        Ok(())
    }

    /// Marks the page dirty by `txn`, or clean.
    pub fn mark_dirty(&mut self, dirty: bool, txn: TransactionId) {
        self.dirtied_by = dirty.then_some(txn);
    }

    /// Returns the transaction that dirtied the page, or None if clean.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    /// Returns the page as of its last load or write-back.
    pub fn before_image(&self) -> Result<HeapPage> {
        HeapPage::from_bytes(
            self.page_id,
            Arc::clone(&self.schema),
            self.layout.page_size(),
            &self.before_image,
        )
    }

    /// Returns the raw bytes of the before-image.
    pub fn before_image_bytes(&self) -> &Bytes {
        &self.before_image
    }

    /// Snapshots the current contents as the new before-image.
    pub fn set_before_image(&mut self) {
        self.before_image = self.to_bytes();
    }

    /// Installs bytes just written for this page as its before-image.
    pub(crate) fn set_before_image_bytes(&mut self, data: Bytes) {
        debug_assert_eq!(data.len(), self.layout.page_size());
        self.before_image = data;
    }

    /// Iterates over the tuples on this page in slot order.
    pub fn iter(&self) -> HeapPageIterator<'_> {
        HeapPageIterator {
            slots: self.tuples.iter(),
        }
    }
}

impl<'a> IntoIterator for &'a HeapPage {
    type Item = &'a Tuple;
    type IntoIter = HeapPageIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the occupied slots of a heap page.
pub struct HeapPageIterator<'a> {
    slots: std::slice::Iter<'a, Option<Tuple>>,
}

impl<'a> Iterator for HeapPageIterator<'a> {
    type Item = &'a Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.by_ref().flatten().next()
    }
}

#[inline]
fn bit_is_set(header: &[u8], slot: usize) -> bool {
    header[slot / 8] & (1 << (slot % 8)) != 0
}

#[inline]
fn set_bit(header: &mut [u8], slot: usize, used: bool) {
    if used {
        header[slot / 8] |= 1 << (slot % 8);
    } else {
        header[slot / 8] &= !(1 << (slot % 8));
    }
}
