//! Tuple representation and serialization.

use bytes::{Buf, BufMut};
use std::sync::Arc;
use strata_common::page::PageId;
use strata_common::{CodecError, Result, Schema, StrataError, Value};

/// Location of a tuple: the page holding it and its slot on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Page containing this tuple.
    pub page_id: PageId,
    /// Slot number within the page.
    pub slot: u16,
}

impl RecordId {
    /// Creates a new record ID.
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot)
    }
}

/// A tuple (row) conforming to a schema.
///
/// Values always match the schema's field types and are normalized to what a
/// round trip through a page would return (strings truncated to their
/// declared width). The record ID is only set once the tuple sits on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple from values, one per schema field.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.num_fields() {
            return Err(StrataError::SchemaMismatch(format!(
                "expected {} fields, got {}",
                schema.num_fields(),
                values.len()
            )));
        }

        let values = values
            .into_iter()
            .zip(schema.fields())
            .enumerate()
            .map(|(i, (value, field))| {
                let found = value_kind(&value);
                field.field_type.coerce(value).ok_or_else(|| {
                    StrataError::SchemaMismatch(format!(
                        "field {} ({}) expects {}, got {}",
                        i, field.name, field.field_type, found
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Returns the tuple's schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns all field values in schema order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the value of field `index`.
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Replaces the value of field `index`. The value's type must match the
    /// schema at that index.
    pub fn set_field(&mut self, index: usize, value: Value) -> Result<()> {
        let field_type = self.schema.field_type(index).ok_or_else(|| {
            StrataError::SchemaMismatch(format!(
                "field index {} out of range for {} fields",
                index,
                self.schema.num_fields()
            ))
        })?;
        let found = value_kind(&value);
        let value = field_type.coerce(value).ok_or_else(|| {
            StrataError::SchemaMismatch(format!(
                "field {} expects {}, got {}",
                index, field_type, found
            ))
        })?;
        self.values[index] = value;
        Ok(())
    }

    /// Returns where this tuple is stored, if it has been placed on a page.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    /// Sets or clears the tuple's location.
    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Checks that this tuple can be stored in a table with `schema`.
    ///
    /// Field names are not compared; arity and field types must match.
    pub fn check_schema(&self, schema: &Schema) -> Result<()> {
        if self.schema.num_fields() != schema.num_fields() {
            return Err(StrataError::SchemaMismatch(format!(
                "table has {} fields, tuple has {}",
                schema.num_fields(),
                self.schema.num_fields()
            )));
        }
        for (i, (ours, theirs)) in self.schema.fields().iter().zip(schema.fields()).enumerate() {
            if ours.field_type != theirs.field_type {
                return Err(StrataError::SchemaMismatch(format!(
                    "field {} is {} in table, {} in tuple",
                    i, theirs.field_type, ours.field_type
                )));
            }
        }
        Ok(())
    }

    /// Size of the serialized tuple in bytes.
    pub fn size_on_disk(&self) -> usize {
        self.schema.tuple_size()
    }

    /// Appends the tuple's fields in schema order, exactly
    /// `size_on_disk()` bytes.
    pub fn serialize_into(&self, buf: &mut impl BufMut) {
        for (value, field) in self.values.iter().zip(self.schema.fields()) {
            // Values are checked against the schema on every write path.
            let written = field.field_type.encode(value, &mut *buf);
            debug_assert!(written, "tuple value does not match its schema");
        }
    }

    /// Decodes one tuple from the front of `buf`, consuming
    /// `schema.tuple_size()` bytes.
    pub fn deserialize(schema: Arc<Schema>, buf: &mut impl Buf) -> std::result::Result<Self, CodecError> {
        let values = schema
            .fields()
            .iter()
            .map(|field| field.field_type.decode(&mut *buf))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "integer",
        Value::Str(_) => "string",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use strata_common::{Field, FieldType};

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(vec![
                Field::new(FieldType::Int, "id"),
                Field::new(FieldType::FixedString(8), "name"),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_record_id_display() {
        let rid = RecordId::new(PageId::new(3, 7), 12);
        assert_eq!(rid.to_string(), "3:7:12");
    }

    #[test]
    fn test_tuple_new() {
        let tuple = Tuple::new(schema(), vec![Value::Int(1), Value::from("alice")]).unwrap();
        assert_eq!(tuple.field(0), Some(&Value::Int(1)));
        assert_eq!(tuple.field(1), Some(&Value::from("alice")));
        assert!(tuple.record_id().is_none());
        assert_eq!(tuple.size_on_disk(), 12);
    }

    #[test]
    fn test_tuple_new_wrong_arity() {
        let result = Tuple::new(schema(), vec![Value::Int(1)]);
        assert!(matches!(result, Err(StrataError::SchemaMismatch(_))));
    }

    #[test]
    fn test_tuple_new_wrong_type() {
        let result = Tuple::new(schema(), vec![Value::from("1"), Value::from("alice")]);
        assert!(matches!(result, Err(StrataError::SchemaMismatch(_))));
    }

    #[test]
    fn test_tuple_new_truncates_long_strings() {
        let tuple = Tuple::new(schema(), vec![Value::Int(1), Value::from("bartholomew")]).unwrap();
        assert_eq!(tuple.field(1), Some(&Value::from("bartholo")));
    }

    #[test]
    fn test_set_field() {
        let mut tuple = Tuple::new(schema(), vec![Value::Int(1), Value::from("a")]).unwrap();
        tuple.set_field(0, Value::Int(99)).unwrap();
        assert_eq!(tuple.field(0), Some(&Value::Int(99)));

        assert!(matches!(
            tuple.set_field(0, Value::from("x")),
            Err(StrataError::SchemaMismatch(_))
        ));
        assert!(matches!(
            tuple.set_field(5, Value::Int(0)),
            Err(StrataError::SchemaMismatch(_))
        ));
        // Failed writes leave the tuple untouched.
        assert_eq!(tuple.field(0), Some(&Value::Int(99)));
    }

    #[test]
    fn test_check_schema_ignores_names() {
        let tuple = Tuple::new(schema(), vec![Value::Int(1), Value::from("a")]).unwrap();
        let renamed = Schema::from_types(&[FieldType::Int, FieldType::FixedString(8)]).unwrap();
        assert!(tuple.check_schema(&renamed).is_ok());

        let wider = Schema::from_types(&[FieldType::Int, FieldType::FixedString(9)]).unwrap();
        assert!(matches!(
            tuple.check_schema(&wider),
            Err(StrataError::SchemaMismatch(_))
        ));

        let shorter = Schema::from_types(&[FieldType::Int]).unwrap();
        assert!(matches!(
            tuple.check_schema(&shorter),
            Err(StrataError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_serialize_deserialize() {
        let tuple = Tuple::new(schema(), vec![Value::Int(-5), Value::from("bob")]).unwrap();
        let mut buf = BytesMut::new();
        tuple.serialize_into(&mut buf);
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf[..4], &[0xFF, 0xFF, 0xFF, 0xFB]);
        assert_eq!(&buf[4..], b"bob\0\0\0\0\0");

        let mut src: &[u8] = &buf;
        let decoded = Tuple::deserialize(schema(), &mut src).unwrap();
        assert_eq!(decoded, tuple);
    }

    #[test]
    fn test_deserialize_too_short() {
        let mut src: &[u8] = &[0, 0, 0, 1, b'a'];
        assert!(matches!(
            Tuple::deserialize(schema(), &mut src),
            Err(CodecError::ShortBuffer { .. })
        ));
    }

    #[test]
    fn test_display() {
        let tuple = Tuple::new(schema(), vec![Value::Int(7), Value::from("carol")]).unwrap();
        assert_eq!(tuple.to_string(), "7\tcarol");
    }
}
