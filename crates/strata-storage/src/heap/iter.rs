//! Tuple iteration with an explicit open/close lifecycle.

use super::file::HeapFile;
use crate::cache::{AccessMode, PageCache, PageGuard};
use crate::tuple::Tuple;
use std::sync::Arc;
use strata_common::page::PageId;
use strata_common::{Result, Schema, StrataError, TransactionId};

/// A pull-based tuple source.
///
/// Every method except `open`, `close` and `schema` fails with
/// `IteratorState` unless the iterator is open.
pub trait TupleIterator {
    /// Starts the iteration. Fails if already open.
    fn open(&mut self) -> Result<()>;

    /// Returns true if another tuple is available.
    fn has_next(&mut self) -> Result<bool>;

    /// Returns the next tuple, or None once exhausted.
    fn next_tuple(&mut self) -> Result<Option<Tuple>>;

    /// Restarts from the first tuple.
    fn rewind(&mut self) -> Result<()>;

    /// Ends the iteration and releases held resources. Closing twice is a
    /// no-op.
    fn close(&mut self);

    /// Schema of the produced tuples.
    fn schema(&self) -> &Arc<Schema>;
}

/// Sequential scan over a heap file, page by page through a page cache.
///
/// The page under the cursor stays checked out read-only until the scan
/// moves past it, rewinds, or closes.
pub struct HeapFileIterator<'a, C: PageCache + ?Sized> {
    file: &'a HeapFile,
    cache: &'a C,
    txn: TransactionId,
    /// None while closed.
    cursor: Option<ScanCursor>,
}

struct ScanCursor {
    page_num: u32,
    page: Option<PageGuard>,
    next_slot: usize,
    peeked: Option<Tuple>,
}

impl ScanCursor {
    fn start() -> Self {
        Self {
            page_num: 0,
            page: None,
            next_slot: 0,
            peeked: None,
        }
    }
}

impl<'a, C: PageCache + ?Sized> HeapFileIterator<'a, C> {
    pub(crate) fn new(file: &'a HeapFile, cache: &'a C, txn: TransactionId) -> Self {
        Self {
            file,
            cache,
            txn,
            cursor: None,
        }
    }

    /// Returns true between `open` and `close`.
    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    fn cursor(&mut self) -> Result<&mut ScanCursor> {
        self.cursor
            .as_mut()
            .ok_or(StrataError::IteratorState("iterator is not open"))
    }

    /// Advances to the next occupied slot, fetching pages as needed.
    fn advance(&mut self) -> Result<Option<Tuple>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(StrataError::IteratorState("iterator is not open"));
        };

        loop {
            if let Some(page) = &cursor.page {
                if let Some(slot) = page.next_used_slot(cursor.next_slot) {
                    cursor.next_slot = slot + 1;
                    return Ok(page.tuple(slot).cloned());
                }
                cursor.page = None;
                cursor.page_num += 1;
                cursor.next_slot = 0;
            }

            if cursor.page_num >= self.file.num_pages()? {
                return Ok(None);
            }
            let page_id = PageId::new(self.file.table_id(), cursor.page_num);
            cursor.page = Some(self.cache.get_page(self.txn, page_id, AccessMode::ReadOnly)?);
        }
    }
}

impl<C: PageCache + ?Sized> TupleIterator for HeapFileIterator<'_, C> {
    fn open(&mut self) -> Result<()> {
        if self.cursor.is_some() {
            return Err(StrataError::IteratorState("iterator is already open"));
        }
        self.cursor = Some(ScanCursor::start());
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        if self.cursor()?.peeked.is_some() {
            return Ok(true);
        }
        let next = self.advance()?;
        let cursor = self.cursor()?;
        cursor.peeked = next;
        Ok(cursor.peeked.is_some())
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        if let Some(tuple) = self.cursor()?.peeked.take() {
            return Ok(Some(tuple));
        }
        self.advance()
    }

    fn rewind(&mut self) -> Result<()> {
        *self.cursor()? = ScanCursor::start();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor = None;
    }

    fn schema(&self) -> &Arc<Schema> {
        self.file.schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapFileConfig;
    use crate::testing::FileCache;
    use strata_common::{FieldType, Value};
    use tempfile::tempdir;

    fn create_test_heap() -> (HeapFile, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let schema = Arc::new(Schema::from_types(&[FieldType::Int]).unwrap());
        let config = HeapFileConfig {
            page_size: 128,
            fsync_enabled: false,
        };
        let heap = HeapFile::open(dir.path().join("t.dat"), schema, config).unwrap();
        (heap, dir)
    }

    fn fill(heap: &HeapFile, cache: &FileCache<'_>, n: i32) -> Vec<Tuple> {
        (0..n)
            .map(|i| {
                let mut t = Tuple::new(Arc::clone(heap.schema()), vec![Value::Int(i)]).unwrap();
                heap.insert_tuple(cache, TransactionId(1), &mut t).unwrap();
                t
            })
            .collect()
    }

    fn drain(iter: &mut impl TupleIterator) -> Vec<i32> {
        let mut out = Vec::new();
        while let Some(t) = iter.next_tuple().unwrap() {
            out.push(t.field(0).and_then(Value::as_int).unwrap());
        }
        out
    }

    #[test]
    fn test_iterator_requires_open() {
        let (heap, _dir) = create_test_heap();
        let cache = FileCache::new(&heap);
        let mut iter = heap.iter(&cache, TransactionId(1));

        assert!(!iter.is_open());
        assert!(matches!(
            iter.next_tuple(),
            Err(StrataError::IteratorState(_))
        ));
        assert!(matches!(iter.has_next(), Err(StrataError::IteratorState(_))));
        assert!(matches!(iter.rewind(), Err(StrataError::IteratorState(_))));

        iter.open().unwrap();
        assert!(matches!(iter.open(), Err(StrataError::IteratorState(_))));

        iter.close();
        iter.close();
        assert!(matches!(
            iter.next_tuple(),
            Err(StrataError::IteratorState(_))
        ));
    }

    #[test]
    fn test_iterator_empty_file() {
        let (heap, _dir) = create_test_heap();
        let cache = FileCache::new(&heap);
        let mut iter = heap.iter(&cache, TransactionId(1));
        iter.open().unwrap();
        assert!(!iter.has_next().unwrap());
        assert!(iter.next_tuple().unwrap().is_none());
    }

    #[test]
    fn test_iterator_visits_every_tuple_in_order() {
        let (heap, _dir) = create_test_heap();
        let cache = FileCache::new(&heap);
        let tuples = fill(&heap, &cache, 70);
        for t in [&tuples[0], &tuples[31], &tuples[45]] {
            heap.delete_tuple(&cache, TransactionId(1), t).unwrap();
        }

        let mut iter = heap.iter(&cache, TransactionId(2));
        iter.open().unwrap();
        let expected: Vec<i32> = (0..70).filter(|i| ![0, 31, 45].contains(i)).collect();
        assert_eq!(drain(&mut iter), expected);
        assert!(iter.next_tuple().unwrap().is_none());
    }

    #[test]
    fn test_iterator_tuples_carry_record_ids() {
        let (heap, _dir) = create_test_heap();
        let cache = FileCache::new(&heap);
        let tuples = fill(&heap, &cache, 35);

        let mut iter = heap.iter(&cache, TransactionId(1));
        iter.open().unwrap();
        for original in &tuples {
            let scanned = iter.next_tuple().unwrap().unwrap();
            assert_eq!(scanned.record_id(), original.record_id());
        }
    }

    #[test]
    fn test_iterator_rewind() {
        let (heap, _dir) = create_test_heap();
        let cache = FileCache::new(&heap);
        fill(&heap, &cache, 40);

        let mut iter = heap.iter(&cache, TransactionId(1));
        iter.open().unwrap();
        let first = drain(&mut iter);

        iter.rewind().unwrap();
        assert_eq!(drain(&mut iter), first);

        // Rewind from the middle.
        iter.rewind().unwrap();
        iter.next_tuple().unwrap();
        iter.next_tuple().unwrap();
        iter.rewind().unwrap();
        assert_eq!(drain(&mut iter), first);
    }

    #[test]
    fn test_iterator_has_next_does_not_consume() {
        let (heap, _dir) = create_test_heap();
        let cache = FileCache::new(&heap);
        fill(&heap, &cache, 2);

        let mut iter = heap.iter(&cache, TransactionId(1));
        iter.open().unwrap();
        assert!(iter.has_next().unwrap());
        assert!(iter.has_next().unwrap());
        assert_eq!(drain(&mut iter), vec![0, 1]);
        assert!(!iter.has_next().unwrap());
    }

    #[test]
    fn test_iterator_close_releases_page() {
        let (heap, _dir) = create_test_heap();
        let cache = FileCache::new(&heap);
        fill(&heap, &cache, 3);
        let page_id = PageId::new(heap.table_id(), 0);

        let mut iter = heap.iter(&cache, TransactionId(1));
        iter.open().unwrap();
        iter.next_tuple().unwrap();
        assert!(cache.is_checked_out(page_id));

        iter.close();
        assert!(!cache.is_checked_out(page_id));
    }
}
